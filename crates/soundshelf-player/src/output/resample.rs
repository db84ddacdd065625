//! Rubato resample stage, inserted when the source rate differs from the output rate.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use super::queue::SampleQueue;

/// Start a resampler thread converting `source` from `from_rate` to `to_rate`.
///
/// The returned queue is closed once `source` is closed and fully consumed.
pub(crate) fn start_resampler(
    source: Arc<SampleQueue>,
    from_rate: u32,
    to_rate: u32,
    chunk_frames: usize,
    buffer_seconds: f32,
) -> Result<Arc<SampleQueue>> {
    let channels = source.channels();
    let chunk_frames = chunk_frames.max(1);

    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: calculate_cutoff(128, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };
    let resampler = Async::<f32>::new_sinc(
        f64::from(to_rate) / f64::from(from_rate),
        1.1,
        &params,
        chunk_frames,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| anyhow!("create resampler {from_rate} -> {to_rate} Hz: {e}"))?;

    let output = Arc::new(SampleQueue::for_duration(to_rate, channels, buffer_seconds));
    let stage_output = Arc::clone(&output);
    thread::Builder::new()
        .name("resample".to_string())
        .spawn(move || {
            let mut stage = Stage {
                resampler,
                channels,
                scratch: Vec::new(),
            };
            if let Err(e) = stage.run(&source, &stage_output, chunk_frames) {
                tracing::warn!("resampler stopped: {e:#}");
                source.close();
            }
            stage_output.close();
        })
        .context("spawn resample thread")?;

    tracing::info!(from_rate, to_rate, "resampling");
    Ok(output)
}

struct Stage {
    resampler: Async<f32>,
    channels: usize,
    scratch: Vec<f32>,
}

impl Stage {
    fn run(&mut self, input: &SampleQueue, output: &SampleQueue, chunk_frames: usize) -> Result<()> {
        while let Some(chunk) = input.pop_exact(chunk_frames) {
            if !self.process(&chunk, None, output)? {
                return Ok(());
            }
        }
        // Closed with less than a full chunk left.
        while let Some(tail) = input.pop_up_to(chunk_frames) {
            let frames = tail.len() / self.channels;
            if !self.process(&tail, Some(frames), output)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Resample one chunk into `output`. `false` when `output` was closed.
    fn process(&mut self, input: &[f32], partial: Option<usize>, output: &SampleQueue) -> Result<bool> {
        let frames = input.len() / self.channels;
        let out_frames = self.resampler.output_frames_max();
        self.scratch.resize(out_frames * self.channels, 0.0);

        let input_adapter = InterleavedSlice::new(input, self.channels, frames)
            .map_err(|e| anyhow!("input buffer: {e}"))?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut self.scratch, self.channels, out_frames)
            .map_err(|e| anyhow!("output buffer: {e}"))?;
        let indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: partial,
        };

        let (_, produced) = self
            .resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .map_err(|e| anyhow!("resample: {e}"))?;

        let produced = produced * self.channels;
        Ok(produced == 0 || output.push(&self.scratch[..produced]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_a_closed_source_and_closes_output() {
        let source = Arc::new(SampleQueue::new(2, 48_000 * 2));
        let tone: Vec<f32> = (0..4_000)
            .flat_map(|i| {
                let s = (i as f32 * 0.05).sin() * 0.5;
                [s, s]
            })
            .collect();
        assert!(source.push(&tone));
        source.close();

        let output = start_resampler(Arc::clone(&source), 48_000, 44_100, 1024, 1.0).unwrap();

        let mut samples = 0usize;
        while let Some(chunk) = output.pop_up_to(1024) {
            assert_eq!(chunk.len() % 2, 0);
            samples += chunk.len();
        }
        assert!(samples > 0);
        assert_eq!(output.channels(), 2);
    }
}
