//! `soundshelf`: a command-line client for a SoundShelf music catalog.
//!
//! Browses the catalog over its REST API, manages the account session, downloads
//! tracks, and plays them on the local audio output through
//! [`soundshelf_player::PlaybackCoordinator`].

mod api;
mod auth;
mod cli;
mod commands;
mod config;
mod format;
mod pagination;
mod play;
mod query;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{API_URL_ENV, FileConfig, Settings};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,soundshelf=info")),
        )
        .init();

    let file = FileConfig::discover(args.config.as_deref())?;
    let settings = Settings::resolve(file, std::env::var(API_URL_ENV).ok(), args.api_url)?;
    tracing::debug!(api_url = %settings.api_url, "settings resolved");

    commands::run(args.cmd, settings)
}
