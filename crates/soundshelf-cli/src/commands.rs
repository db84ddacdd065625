//! Subcommand handlers.

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use soundshelf_types::{Genre, Mood, Page, TrackDetail, TrackSummary};

use crate::api::CatalogClient;
use crate::auth::{self, SessionStore};
use crate::cli::{Command, TrackFilters};
use crate::config::{Settings, check_volume};
use crate::format::{format_duration, format_file_size};
use crate::pagination::Pagination;
use crate::play::{self, PlayOptions};
use crate::query::{Filter, TrackQuery};

pub const PASSWORD_ENV: &str = "SOUNDSHELF_PASSWORD";

pub fn run(cmd: Command, mut settings: Settings) -> Result<()> {
    let client = CatalogClient::new(&settings.api_url);
    match cmd {
        Command::Tracks(filters) => {
            let query = build_query(&filters)?;
            let page = client.tracks(&query)?;
            print!("{}", render_page(&page, settings.page_size, query.current_page()));
        }
        Command::Show { id } => print!("{}", render_detail(&client.track(&id)?)),
        Command::Similar { id } => print_rows(&client.similar(&id)?),
        Command::Genres => print!("{}", render_categories(&genre_rows(&client.genres()?))),
        Command::Moods => print!("{}", render_categories(&mood_rows(&client.moods()?))),
        Command::Featured => print_rows(&client.featured()?),
        Command::Popular => print_rows(&client.popular()?),
        Command::Download { id, out } => {
            let path = client.download(&id, out.as_deref())?;
            println!("saved {}", path.display());
        }
        Command::Login { username } => {
            let store = SessionStore::default_location()?;
            let password = read_password()?;
            let user = auth::login(&client, &store, &username, &password)?;
            println!("signed in as {}", user.username);
        }
        Command::Register { username, email } => {
            let store = SessionStore::default_location()?;
            let password = read_password()?;
            let user = auth::register(&client, &store, &username, &email, &password)?;
            println!("registered and signed in as {}", user.username);
        }
        Command::Logout => {
            auth::logout(&SessionStore::default_location()?)?;
            println!("signed out");
        }
        Command::Whoami => {
            let store = SessionStore::default_location()?;
            match auth::load_user(&client, &store)? {
                Some(user) => println!("{} <{}>", user.username, user.email),
                None => println!("not signed in"),
            }
        }
        Command::Play {
            id,
            volume,
            start,
            device,
        } => {
            let volume = volume.map(check_volume).transpose()?;
            if device.is_some() {
                settings.output.device_name = device;
            }
            let track = TrackSummary::from(&client.track(&id)?);
            let recorder = Arc::new(client);
            play::run(&track, &settings, recorder, &PlayOptions { volume, start })?;
        }
        Command::Devices => {
            for info in soundshelf_player::list_output_devices()? {
                let marker = if info.is_default { "*" } else { " " };
                let rate = info
                    .max_rate
                    .map(|r| format!("  (up to {r} Hz)"))
                    .unwrap_or_default();
                println!("{marker} {}{rate}", info.name);
            }
        }
    }
    Ok(())
}

pub fn build_query(filters: &TrackFilters) -> Result<TrackQuery> {
    let mut query = TrackQuery::default();
    let fields = [
        (Filter::Search, &filters.search),
        (Filter::Genre, &filters.genre),
        (Filter::Mood, &filters.mood),
        (Filter::Featured, &filters.featured),
        (Filter::MinDuration, &filters.min_duration),
        (Filter::MaxDuration, &filters.max_duration),
        (Filter::MinBpm, &filters.min_bpm),
        (Filter::MaxBpm, &filters.max_bpm),
        (Filter::Ordering, &filters.ordering),
    ];
    for (filter, value) in fields {
        if let Some(value) = value {
            query.set(filter, value)?;
        }
    }
    query.set_page(filters.page);
    Ok(query)
}

/// `id  title - artist  m:ss  genre/mood  bpm  plays`
pub fn track_row(track: &TrackSummary) -> String {
    let artist = track
        .artist()
        .map(|a| format!(" - {a}"))
        .unwrap_or_default();
    let category = match (&track.genre_name, &track.mood_name) {
        (Some(g), Some(m)) => format!("{g}/{m}"),
        (Some(g), None) => g.clone(),
        (None, Some(m)) => m.clone(),
        (None, None) => "-".to_string(),
    };
    let bpm = track
        .bpm
        .map(|b| format!("{b} bpm"))
        .unwrap_or_else(|| "- bpm".to_string());
    let star = if track.is_featured { " *" } else { "" };
    format!(
        "{}  {}{artist}{star}  {}  {category}  {bpm}  {} plays",
        track.id,
        track.title,
        format_duration(track.duration),
        track.play_count,
    )
}

fn print_rows(tracks: &[TrackSummary]) {
    if tracks.is_empty() {
        println!("no tracks");
    }
    for track in tracks {
        println!("{}", track_row(track));
    }
}

pub fn render_page(page: &Page<TrackSummary>, page_size: u32, current: u32) -> String {
    let mut out = String::new();
    if page.results.is_empty() {
        out.push_str("no tracks\n");
    }
    for track in &page.results {
        out.push_str(&track_row(track));
        out.push('\n');
    }
    let pages = Pagination::new(page.count, page_size, current);
    if pages.is_visible() {
        let mut hints = Vec::new();
        if pages.has_previous() {
            hints.push(format!("--page {} for previous", pages.current - 1));
        }
        if pages.has_next() {
            hints.push(format!("--page {} for next", pages.current + 1));
        }
        out.push_str(&format!(
            "page {} ({} tracks){}\n",
            pages.label(),
            page.count,
            if hints.is_empty() {
                String::new()
            } else {
                format!("; {}", hints.join(", "))
            }
        ));
    }
    out
}

pub fn render_detail(track: &TrackDetail) -> String {
    let mut out = format!("{}\n", track.title);
    let mut field = |label: &str, value: String| {
        out.push_str(&format!("  {label:<10} {value}\n"));
    };
    field("id", track.id.clone());
    if let Some(artist) = track.artist() {
        field("artist", artist.to_string());
    }
    if let Some(genre) = &track.genre {
        field("genre", genre.name.clone());
    }
    if let Some(mood) = &track.mood {
        field("mood", mood.name.clone());
    }
    if let Some(language) = track.language() {
        field("language", language.to_string());
    }
    field("duration", format_duration(track.duration));
    if let Some(bpm) = track.bpm {
        field("bpm", bpm.to_string());
    }
    field("size", format_file_size(track.file_size));
    field(
        "stats",
        format!("{} plays, {} downloads", track.play_count, track.download_count),
    );
    if !track.tags_list.is_empty() {
        field("tags", track.tags_list.join(", "));
    }
    if TrackSummary::from(track).playable_url().is_none() {
        field("audio", "unavailable".to_string());
    }
    if !track.description.trim().is_empty() {
        out.push_str(&format!("\n{}\n", track.description.trim()));
    }
    if !track.lyrics.trim().is_empty() {
        out.push_str(&format!("\nLyrics:\n{}\n", track.lyrics.trim()));
    }
    out
}

fn genre_rows(genres: &[Genre]) -> Vec<(String, String, u64)> {
    genres
        .iter()
        .map(|g| (g.slug.clone(), g.name.clone(), g.track_count))
        .collect()
}

fn mood_rows(moods: &[Mood]) -> Vec<(String, String, u64)> {
    moods
        .iter()
        .map(|m| (m.slug.clone(), m.name.clone(), m.track_count))
        .collect()
}

/// `slug  name (n)` lines, slugs padded to one column.
fn render_categories(rows: &[(String, String, u64)]) -> String {
    let width = rows.iter().map(|(slug, _, _)| slug.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(slug, name, count)| format!("{slug:<width$}  {name} ({count})\n"))
        .collect()
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    eprintln!("password:");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    password_from_line(&line)
}

fn password_from_line(line: &str) -> Result<String> {
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("empty password (set {PASSWORD_ENV} or pipe it on stdin)");
    }
    Ok(password.to_string())
}
