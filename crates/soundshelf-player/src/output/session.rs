//! One playback session: a single pass over one source from a start offset.
//!
//! Seeking or loading another track cancels the session and starts a new one; the
//! worker never rewinds a running pipeline.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::Sender;

use super::decode::{self, DecodedSource};
use super::http_source::HttpRangeSource;
use super::resample;
use super::select;
use super::stream::{self, SharedVolume, StreamControls};
use crate::config::{OutputConfig, PlaybackConfig};
use crate::device::{DeviceEvent, DeviceEventKind};

pub(crate) struct SessionSpec {
    pub(crate) generation: u64,
    pub(crate) url: String,
    /// Offset in seconds to start decoding from.
    pub(crate) start_at: f64,
    pub(crate) paused: bool,
}

pub(crate) struct SessionHandle {
    start_at: f64,
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
    played_frames: Arc<AtomicU64>,
    output_rate: Arc<AtomicU32>,
    join: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Seconds into the track.
    pub(crate) fn position(&self) -> f64 {
        position_at(
            self.start_at,
            self.played_frames.load(Ordering::Relaxed),
            self.output_rate.load(Ordering::Relaxed),
        )
    }

    /// The session thread has exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// The source played out to its end.
    pub(crate) fn reached_end(&self) -> bool {
        self.ended.load(Ordering::Relaxed)
    }

    /// Cancel without waiting for the thread to exit.
    pub(crate) fn cancel(self) {
        self.cancel.store(true, Ordering::Relaxed);
        let join = self.join;
        let _ = thread::Builder::new()
            .name("session-reaper".to_string())
            .spawn(move || {
                let _ = join.join();
            });
    }

    /// Cancel and wait for the thread to exit.
    pub(crate) fn cancel_and_join(self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.join.join();
    }
}

fn position_at(start_at: f64, played_frames: u64, rate: u32) -> f64 {
    if rate == 0 {
        start_at
    } else {
        start_at + played_frames as f64 / f64::from(rate)
    }
}

/// Smaller buffers after a seek so audio resumes quickly.
fn tuned_for_seek(playback: &PlaybackConfig, start_at: f64) -> PlaybackConfig {
    let mut tuned = playback.clone();
    if start_at > 0.0 {
        tuned.buffer_seconds = tuned.buffer_seconds.min(1.0);
        tuned.refill_max_frames = tuned.refill_max_frames.min(2048);
        tuned.chunk_frames = tuned.chunk_frames.min(1024);
    }
    tuned
}

/// Spawn the session thread. Events are tagged with `spec.generation`.
pub(crate) fn start_session(
    spec: SessionSpec,
    config: &OutputConfig,
    volume: &Arc<SharedVolume>,
    events: &Sender<DeviceEvent>,
) -> Result<SessionHandle> {
    let start_at = spec.start_at.max(0.0);
    let cancel = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(spec.paused));
    let ended = Arc::new(AtomicBool::new(false));
    let played_frames = Arc::new(AtomicU64::new(0));
    let output_rate = Arc::new(AtomicU32::new(0));

    let ctx = SessionContext {
        generation: spec.generation,
        url: spec.url,
        start_at,
        config: config.clone(),
        volume: Arc::clone(volume),
        events: events.clone(),
        cancel: Arc::clone(&cancel),
        paused: Arc::clone(&paused),
        ended: Arc::clone(&ended),
        played_frames: Arc::clone(&played_frames),
        output_rate: Arc::clone(&output_rate),
        fault: Arc::new(OnceLock::new()),
    };
    let join = thread::Builder::new()
        .name(format!("session-{}", spec.generation))
        .spawn(move || ctx.run())
        .context("spawn playback session")?;

    Ok(SessionHandle {
        start_at,
        cancel,
        paused,
        ended,
        played_frames,
        output_rate,
        join,
    })
}

struct SessionContext {
    generation: u64,
    url: String,
    start_at: f64,
    config: OutputConfig,
    volume: Arc<SharedVolume>,
    events: Sender<DeviceEvent>,
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
    played_frames: Arc<AtomicU64>,
    output_rate: Arc<AtomicU32>,
    fault: Arc<OnceLock<String>>,
}

impl SessionContext {
    fn emit(&self, kind: DeviceEventKind) {
        let _ = self.events.send(DeviceEvent::new(self.generation, kind));
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn run(self) {
        tracing::debug!(
            generation = self.generation,
            url = %self.url,
            start_at = self.start_at,
            "session starting"
        );
        match self.play() {
            Ok(true) => {
                if let Some(message) = self.fault.get() {
                    self.emit(DeviceEventKind::Error {
                        message: message.clone(),
                    });
                } else {
                    self.ended.store(true, Ordering::Relaxed);
                    self.emit(DeviceEventKind::Ended);
                }
            }
            Ok(false) => {
                tracing::debug!(generation = self.generation, "session cancelled");
            }
            Err(e) if self.cancelled() => {
                tracing::debug!(generation = self.generation, "session cancelled: {e:#}");
            }
            Err(e) => {
                tracing::warn!(generation = self.generation, url = %self.url, "playback failed: {e:#}");
                self.emit(DeviceEventKind::Error {
                    message: format!("{e:#}"),
                });
            }
        }
    }

    /// `Ok(true)` when the source drained, `Ok(false)` when cancelled.
    fn play(&self) -> Result<bool> {
        let playback = tuned_for_seek(&self.config.playback, self.start_at);

        let source = HttpRangeSource::new(
            self.url.clone(),
            self.config.http_block_size,
            self.config.http_timeout,
            Arc::clone(&self.cancel),
        );
        let DecodedSource {
            rate,
            channels,
            duration,
            queue,
        } = decode::start_decode(
            Box::new(source),
            &decode::hint_for_url(&self.url),
            self.start_at,
            playback.buffer_seconds,
            Arc::clone(&self.cancel),
            Arc::clone(&self.fault),
        )
        .with_context(|| format!("open {}", self.url))?;

        if let Some(duration) = duration {
            self.emit(DeviceEventKind::LoadedMetadata { duration });
        }
        if self.cancelled() {
            queue.close();
            return Ok(false);
        }

        let host = cpal::default_host();
        let device = select::pick_device(&host, self.config.device_name.as_deref())?;
        let supported = select::pick_output_config(&device, rate)?;
        let mut stream_config: cpal::StreamConfig = supported.clone().into();
        if let Some(size) = select::pick_buffer_size(&supported) {
            stream_config.buffer_size = size;
        }
        let out_rate = stream_config.sample_rate;

        let output = if out_rate == rate {
            Arc::clone(&queue)
        } else {
            resample::start_resampler(
                Arc::clone(&queue),
                rate,
                out_rate,
                playback.chunk_frames,
                playback.buffer_seconds,
            )?
        };
        tracing::info!(
            generation = self.generation,
            source_rate = rate,
            output_rate = out_rate,
            channels,
            "output stream configured"
        );

        self.output_rate.store(out_rate, Ordering::Relaxed);
        let stream = stream::build_output_stream(
            &device,
            &stream_config,
            supported.sample_format(),
            Arc::clone(&output),
            StreamControls {
                paused: Arc::clone(&self.paused),
                played_frames: Arc::clone(&self.played_frames),
                volume: Arc::clone(&self.volume),
                fault: Arc::clone(&self.fault),
                refill_max_frames: playback.refill_max_frames,
            },
        )?;
        stream.play().context("start output stream")?;

        let drained = output.wait_drained(&self.cancel);
        if drained {
            // Let the device play out its own buffer.
            thread::sleep(Duration::from_millis(100));
        } else {
            queue.close();
            output.close();
        }
        Ok(drained)
    }
}
