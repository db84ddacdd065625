//! Track list query parameters.

use anyhow::{Result, anyhow};

/// Fields the server accepts for `ordering`, optionally prefixed with `-`.
pub const ORDERING_FIELDS: [&str; 5] = [
    "created_at",
    "download_count",
    "play_count",
    "duration",
    "bpm",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Search,
    Genre,
    Mood,
    Featured,
    MinDuration,
    MaxDuration,
    MinBpm,
    MaxBpm,
    Ordering,
}

impl Filter {
    pub fn key(self) -> &'static str {
        match self {
            Filter::Search => "search",
            Filter::Genre => "genre",
            Filter::Mood => "mood",
            Filter::Featured => "featured",
            Filter::MinDuration => "min_duration",
            Filter::MaxDuration => "max_duration",
            Filter::MinBpm => "min_bpm",
            Filter::MaxBpm => "max_bpm",
            Filter::Ordering => "ordering",
        }
    }
}

/// Filters, search, ordering and page for `GET /tracks/`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackQuery {
    pub search: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    /// Mood slug.
    pub mood: Option<String>,
    pub featured: Option<bool>,
    /// Seconds.
    pub min_duration: Option<u32>,
    pub max_duration: Option<u32>,
    pub min_bpm: Option<u32>,
    pub max_bpm: Option<u32>,
    pub ordering: Option<String>,
    /// 1-based; `None` means the first page.
    pub page: Option<u32>,
}

impl TrackQuery {
    /// Set or clear (`value` empty) one filter. Any change returns to the first page.
    pub fn set(&mut self, filter: Filter, value: &str) -> Result<()> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());
        match filter {
            Filter::Search => self.search = text,
            Filter::Genre => self.genre = text,
            Filter::Mood => self.mood = text,
            Filter::Featured => self.featured = text.map(|v| parse_flag(&v)).transpose()?,
            Filter::MinDuration => self.min_duration = parse_number(filter, text)?,
            Filter::MaxDuration => self.max_duration = parse_number(filter, text)?,
            Filter::MinBpm => self.min_bpm = parse_number(filter, text)?,
            Filter::MaxBpm => self.max_bpm = parse_number(filter, text)?,
            Filter::Ordering => self.ordering = text.map(check_ordering).transpose()?,
        }
        self.page = None;
        Ok(())
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = (page > 1).then_some(page);
    }

    pub fn current_page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Query pairs in a stable order; unset keys and page 1 are omitted.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut push = |filter: Filter, value: Option<String>| {
            if let Some(value) = value {
                out.push((filter.key(), value));
            }
        };
        push(Filter::Search, self.search.clone());
        push(Filter::Genre, self.genre.clone());
        push(Filter::Mood, self.mood.clone());
        push(Filter::Featured, self.featured.map(|f| f.to_string()));
        push(Filter::MinDuration, self.min_duration.map(|v| v.to_string()));
        push(Filter::MaxDuration, self.max_duration.map(|v| v.to_string()));
        push(Filter::MinBpm, self.min_bpm.map(|v| v.to_string()));
        push(Filter::MaxBpm, self.max_bpm.map(|v| v.to_string()));
        push(Filter::Ordering, self.ordering.clone());
        if let Some(page) = self.page {
            out.push(("page", page.to_string()));
        }
        out
    }

    /// `?k=v&...`, or an empty string without parameters.
    pub fn to_query_string(&self) -> String {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return String::new();
        }
        let joined = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{joined}")
    }
}

fn parse_number(filter: Filter, value: Option<String>) -> Result<Option<u32>> {
    value
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| anyhow!("{} must be a whole number, got {v:?}", filter.key()))
        })
        .transpose()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(anyhow!("featured must be true or false, got {value:?}")),
    }
}

fn check_ordering(value: String) -> Result<String> {
    let field = value.strip_prefix('-').unwrap_or(&value);
    if ORDERING_FIELDS.contains(&field) {
        Ok(value)
    } else {
        Err(anyhow!(
            "cannot order by {value:?}; expected one of {} (prefix with - for descending)",
            ORDERING_FIELDS.join(", ")
        ))
    }
}
