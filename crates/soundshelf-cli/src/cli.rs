use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "soundshelf", version = VERSION, about = "Browse and play the SoundShelf catalog")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Config file (default: <config dir>/soundshelf/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog API base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tracks, with optional filters
    Tracks(TrackFilters),

    /// Show one track in full
    Show { id: String },

    /// Tracks similar to the given one
    Similar { id: String },

    /// List genres
    Genres,

    /// List moods
    Moods,

    /// Featured tracks
    Featured,

    /// Most played tracks
    Popular,

    /// Download a track's audio file
    Download {
        id: String,
        /// Target file or directory (default: current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Sign in; the password is read from SOUNDSHELF_PASSWORD or stdin
    Login { username: String },

    /// Create an account and sign in
    Register { username: String, email: String },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Play a track on the local audio output
    Play {
        id: String,
        /// Initial volume between 0 and 1
        #[arg(long)]
        volume: Option<f32>,
        /// Start position in seconds
        #[arg(long)]
        start: Option<f64>,
        /// Output device by substring match
        #[arg(long)]
        device: Option<String>,
    },

    /// List output devices
    Devices,
}

#[derive(ClapArgs, Debug, Default)]
pub struct TrackFilters {
    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,
    /// Genre slug
    #[arg(long)]
    pub genre: Option<String>,
    /// Mood slug
    #[arg(long)]
    pub mood: Option<String>,
    /// Only featured (true) or non-featured (false) tracks
    #[arg(long)]
    pub featured: Option<String>,
    /// Minimum duration in seconds
    #[arg(long)]
    pub min_duration: Option<String>,
    /// Maximum duration in seconds
    #[arg(long)]
    pub max_duration: Option<String>,
    #[arg(long)]
    pub min_bpm: Option<String>,
    #[arg(long)]
    pub max_bpm: Option<String>,
    /// Sort field, prefix with - for descending (e.g. -play_count)
    #[arg(long, allow_hyphen_values = true)]
    pub ordering: Option<String>,
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}
