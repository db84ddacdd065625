//! Symphonia decode stage.
//!
//! Probes the source, optionally seeks, then decodes on a background thread into a
//! bounded [`SampleQueue`] of interleaved `f32`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use super::queue::SampleQueue;

/// A running decode stage.
pub(crate) struct DecodedSource {
    pub(crate) rate: u32,
    pub(crate) channels: usize,
    /// Total source length in seconds, when the container reports it.
    pub(crate) duration: Option<f64>,
    pub(crate) queue: Arc<SampleQueue>,
}

/// Probe `source` and start decoding from `start_at` seconds.
///
/// A failed seek (typically past the end) leaves the queue closed and empty, so the
/// session plays out immediately. Mid-stream failures are stored in `fault`.
pub(crate) fn start_decode(
    source: Box<dyn MediaSource>,
    hint: &Hint,
    start_at: f64,
    buffer_seconds: f32,
    cancel: Arc<AtomicBool>,
    fault: Arc<OnceLock<String>>,
) -> Result<DecodedSource> {
    let stream = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("probe audio source")?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no playable audio track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let rate = params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let channels = params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?
        .count();
    let duration = duration_secs(&params);

    let queue = Arc::new(SampleQueue::for_duration(rate, channels, buffer_seconds));

    if start_at > 0.0 {
        let seek = format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: seek_time(start_at),
                track_id: Some(track_id),
            },
        );
        if let Err(e) = seek {
            tracing::warn!(start_at, "seek failed, treating as end of track: {e}");
            queue.close();
            return Ok(DecodedSource {
                rate,
                channels,
                duration,
                queue,
            });
        }
    }

    let decoder_queue = Arc::clone(&queue);
    thread::Builder::new()
        .name("decode".to_string())
        .spawn(move || {
            if let Err(e) = decode_packets(format, &params, track_id, &decoder_queue, &cancel) {
                tracing::warn!("decoder stopped: {e:#}");
                let _ = fault.set(format!("{e:#}"));
            }
            decoder_queue.close();
        })
        .context("spawn decode thread")?;

    Ok(DecodedSource {
        rate,
        channels,
        duration,
        queue,
    })
}

fn decode_packets(
    mut format: Box<dyn FormatReader>,
    params: &CodecParameters,
    track_id: u32,
    queue: &SampleQueue,
    cancel: &AtomicBool,
) -> Result<()> {
    let mut decoder = symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .context("create decoder")?;

    while !cancel.load(Ordering::Relaxed) {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(anyhow!("read packet: {e}")),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping corrupt packet: {e}");
                continue;
            }
            Err(e) => return Err(anyhow!("decode packet: {e}")),
        };

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);
        if !queue.push(samples.samples()) {
            break;
        }
    }
    Ok(())
}

fn duration_secs(params: &CodecParameters) -> Option<f64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate.filter(|r| *r > 0)?;
    Some(frames as f64 / f64::from(rate))
}

fn seek_time(seconds: f64) -> Time {
    let whole = seconds.trunc();
    Time::new(whole as u64, seconds - whole)
}

/// Container hint from the URL path's extension, ignoring query and fragment.
pub(crate) fn hint_for_url(url: &str) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = url_extension(url) {
        hint.with_extension(&ext);
    }
    hint
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_secs_needs_frames_and_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        assert!(duration_secs(&params).is_none());
        params.n_frames = Some(96_000);
        assert_eq!(duration_secs(&params), Some(2.0));
        params.sample_rate = Some(0);
        assert!(duration_secs(&params).is_none());
    }

    #[test]
    fn seek_time_splits_fractional_seconds() {
        let t = seek_time(61.25);
        assert_eq!(t.seconds, 61);
        assert!((t.frac - 0.25).abs() < 1e-9);
    }

    #[test]
    fn url_extension_ignores_query_and_case() {
        assert_eq!(
            url_extension("https://cdn.example/media/Track.MP3?sig=abc"),
            Some("mp3".to_string())
        );
        assert_eq!(
            url_extension("http://example/a.b.flac#t=10"),
            Some("flac".to_string())
        );
        assert_eq!(url_extension("http://example/stream"), None);
        assert_eq!(url_extension("http://example/.hidden"), None);
    }
}
