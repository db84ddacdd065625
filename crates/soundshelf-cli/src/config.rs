//! Configuration loading.
//!
//! Values come from an optional TOML file, then `SOUNDSHELF_API_URL`, then command-line
//! flags, each overriding the previous layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use soundshelf_player::{OutputConfig, PlaybackConfig};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const API_URL_ENV: &str = "SOUNDSHELF_API_URL";

/// Config file schema. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    /// Catalog API base URL, e.g. `http://localhost:8000/api`.
    pub api_url: Option<String>,
    /// Page size the server paginates with.
    pub page_size: Option<u32>,
    /// Output device name substring.
    pub output_device: Option<String>,
    /// Initial volume in `[0, 1]`.
    pub volume: Option<f32>,
    /// Status refresh interval in milliseconds.
    pub tick_ms: Option<u64>,
    pub playback: Option<PlaybackSection>,
}

/// `[playback]` table.
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackSection {
    pub chunk_frames: Option<usize>,
    pub refill_max_frames: Option<usize>,
    pub buffer_seconds: Option<f32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `explicit` (which must exist), else the default location if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soundshelf").join("config.toml"))
}

/// Fully resolved settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// API base URL without a trailing slash.
    pub api_url: String,
    pub page_size: u32,
    pub volume: Option<f32>,
    pub output: OutputConfig,
}

impl Settings {
    pub fn resolve(
        file: FileConfig,
        env_api_url: Option<String>,
        cli_api_url: Option<String>,
    ) -> Result<Self> {
        let api_url = [cli_api_url, env_api_url, file.api_url]
            .into_iter()
            .flatten()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .find(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let page_size = file.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(anyhow!("page_size must be positive"));
        }
        if let Some(volume) = file.volume {
            check_volume(volume)?;
        }

        let mut output = OutputConfig {
            device_name: file.output_device,
            ..OutputConfig::default()
        };
        if let Some(ms) = file.tick_ms {
            if ms == 0 {
                return Err(anyhow!("tick_ms must be positive"));
            }
            output.tick = Duration::from_millis(ms);
        }
        if let Some(section) = file.playback {
            output.playback = section.apply(output.playback);
        }

        Ok(Self {
            api_url,
            page_size,
            volume: file.volume,
            output,
        })
    }
}

impl PlaybackSection {
    fn apply(self, base: PlaybackConfig) -> PlaybackConfig {
        PlaybackConfig {
            chunk_frames: self.chunk_frames.unwrap_or(base.chunk_frames),
            refill_max_frames: self.refill_max_frames.unwrap_or(base.refill_max_frames),
            buffer_seconds: self.buffer_seconds.unwrap_or(base.buffer_seconds),
        }
    }
}

/// Reject volumes outside `[0, 1]`.
pub fn check_volume(volume: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(anyhow!("volume must be between 0 and 1, got {volume}"))
    }
}
