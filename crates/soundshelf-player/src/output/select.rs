//! Output device and stream config selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Output device as shown by `soundshelf devices`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputInfo {
    pub name: String,
    pub is_default: bool,
    /// Highest supported sample rate, `None` if the device reports no configs.
    pub max_rate: Option<u32>,
}

/// List the host's output devices.
pub fn list_output_devices() -> Result<Vec<OutputInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| device_name(&d));
    let devices = host.output_devices().context("enumerate output devices")?;

    let mut out = Vec::new();
    for device in devices {
        let Some(name) = device_name(&device) else {
            continue;
        };
        let max_rate = device
            .supported_output_configs()
            .ok()
            .and_then(|ranges| ranges.map(|r| r.max_sample_rate()).max());
        out.push(OutputInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            max_rate,
        });
    }
    Ok(out)
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

/// First device whose name contains `needle` (case-insensitive), or the host default.
pub(crate) fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"));
    };

    host.output_devices()
        .context("enumerate output devices")?
        .find(|d| device_name(d).is_some_and(|name| name_matches(&name, needle)))
        .ok_or_else(|| anyhow!("no output device matches {needle:?}"))
}

fn name_matches(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// Ranking of one candidate config; see [`Candidate::beats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Candidate {
    /// Rate does not exceed the source rate.
    fits: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    /// Prefer rates at or below the source, then higher rates, then better sample formats.
    fn beats(&self, other: &Candidate) -> bool {
        if self.fits != other.fits {
            self.fits
        } else if self.rate != other.rate {
            self.rate > other.rate
        } else {
            self.format_rank < other.format_rank
        }
    }
}

/// Supported config closest to `source_rate`, so resampling is skipped when possible.
pub(crate) fn pick_output_config(
    device: &cpal::Device,
    source_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;

    for range in device
        .supported_output_configs()
        .context("query output configs")?
    {
        let rate = rate_in_range(range.min_sample_rate(), range.max_sample_rate(), source_rate);
        let candidate = Candidate {
            fits: rate <= source_rate,
            rate,
            format_rank: format_rank(range.sample_format()),
        };
        if best.as_ref().is_none_or(|(b, _)| candidate.beats(b)) {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, config)| config)
        .ok_or_else(|| anyhow!("device reports no output configs"))
}

/// `target` clamped into `[min, max]`.
fn rate_in_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

/// Largest fixed buffer up to 16384 frames, or `None` to keep the device default.
pub(crate) fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const MAX_FRAMES: u32 = 16_384;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed((*max).min(MAX_FRAMES).max(*min)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}
