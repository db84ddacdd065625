//! CPAL output stream.
//!
//! The callback never blocks: it refills a local buffer from the queue when it runs dry
//! and writes silence on underrun. While paused it writes silence and leaves the queue
//! untouched, so resuming continues exactly where it stopped.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use super::queue::SampleQueue;

/// Output gain shared between the worker and the audio callback.
#[derive(Debug)]
pub(crate) struct SharedVolume(AtomicU32);

impl SharedVolume {
    pub(crate) fn new(level: f32) -> Self {
        Self(AtomicU32::new(level.to_bits()))
    }

    pub(crate) fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Stored level clamped to `[0, 1]`; NaN is silence.
    pub(crate) fn gain(&self) -> f32 {
        let level = f32::from_bits(self.0.load(Ordering::Relaxed));
        if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        }
    }
}

/// Handles the callback reads and updates.
#[derive(Clone)]
pub(crate) struct StreamControls {
    pub(crate) paused: Arc<AtomicBool>,
    pub(crate) played_frames: Arc<AtomicU64>,
    pub(crate) volume: Arc<SharedVolume>,
    pub(crate) fault: Arc<OnceLock<String>>,
    pub(crate) refill_max_frames: usize,
}

pub(crate) fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: Arc<SampleQueue>,
    controls: StreamControls,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build::<f32>(device, config, queue, controls),
        cpal::SampleFormat::I32 => build::<i32>(device, config, queue, controls),
        cpal::SampleFormat::I16 => build::<i16>(device, config, queue, controls),
        cpal::SampleFormat::U16 => build::<u16>(device, config, queue, controls),
        other => Err(anyhow!("unsupported output sample format {other:?}")),
    }
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: Arc<SampleQueue>,
    controls: StreamControls,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let out_channels = usize::from(config.channels).max(1);
    let src_channels = queue.channels();
    let refill = controls.refill_max_frames.max(1);
    let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);

    let mut pending: Vec<f32> = Vec::new();
    let mut cursor = 0usize;
    let fault = Arc::clone(&controls.fault);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if controls.paused.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }
            let gain = controls.volume.gain();
            let mut written = 0u64;

            for frame in data.chunks_mut(out_channels) {
                if cursor >= pending.len() {
                    match queue.try_pop(refill) {
                        Some(next) => {
                            pending = next;
                            cursor = 0;
                        }
                        None => {
                            pending.clear();
                            cursor = 0;
                            frame.fill(silence);
                            continue;
                        }
                    }
                }
                let src = &pending[cursor..cursor + src_channels];
                for (ch, out) in frame.iter_mut().enumerate() {
                    let sample = mix_channel(src, out_channels, ch) * gain;
                    *out = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                cursor += src_channels;
                written += 1;
            }

            if written > 0 {
                controls.played_frames.fetch_add(written, Ordering::Relaxed);
            }
        },
        move |err| {
            tracing::warn!("output stream error: {err}");
            let _ = fault.set(format!("output stream error: {err}"));
        },
        None,
    )?;

    Ok(stream)
}

/// Sample for output channel `ch` from one source frame.
///
/// Stereo folds to mono by averaging, mono fans out to every channel, and wider layouts
/// pass through with missing channels repeating the last source channel.
fn mix_channel(src: &[f32], out_channels: usize, ch: usize) -> f32 {
    match (src.len(), out_channels) {
        (0, _) => 0.0,
        (1, _) => src[0],
        (2, 1) => 0.5 * (src[0] + src[1]),
        (n, _) => src[ch.min(n - 1)],
    }
}
