use std::time::Duration;

/// Pipeline tuning shared by the decode, resample and output stages.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration for each queue.
    pub buffer_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}

/// Settings for [`crate::OutputDevice`].
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Output device name substring; `None` selects the host default.
    pub device_name: Option<String>,
    /// How often position updates are emitted while playing.
    pub tick: Duration,
    /// Bytes per HTTP range request.
    pub http_block_size: usize,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    pub playback: PlaybackConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            tick: Duration::from_millis(250),
            http_block_size: 512 * 1024,
            http_timeout: Duration::from_secs(10),
            playback: PlaybackConfig::default(),
        }
    }
}
