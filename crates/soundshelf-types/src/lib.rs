use serde::{Deserialize, Serialize};

/// Catalog genre with the number of active tracks tagged with it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    /// Stable identifier used by the `genre` list filter.
    pub slug: String,
    #[serde(default)]
    pub track_count: u64,
}

/// Catalog mood with the number of active tracks tagged with it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mood {
    pub id: i64,
    pub name: String,
    /// Stable identifier used by the `mood` list filter.
    pub slug: String,
    #[serde(default)]
    pub track_count: u64,
}

/// Track as returned by list endpoints (`/tracks/`, featured, popular, similar).
///
/// This is also the unit of identity for playback: the player keeps one of these
/// as its current track.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackSummary {
    /// Opaque track id (UUID string on the reference API).
    pub id: String,
    pub title: String,
    pub artist_name: Option<String>,
    pub language: Option<String>,
    pub genre_name: Option<String>,
    pub mood_name: Option<String>,
    /// Catalog duration in seconds.
    pub duration: f64,
    /// Preformatted duration (`m:ss`) supplied by the API.
    pub duration_display: String,
    pub bpm: Option<u32>,
    pub download_count: u64,
    pub play_count: u64,
    /// Playable source. Tracks without one cannot be played.
    pub audio_url: Option<String>,
    /// File size in megabytes.
    pub file_size: f64,
    pub is_featured: bool,
    pub created_at: String,
}

impl TrackSummary {
    /// Playable source URL, ignoring blank values.
    pub fn playable_url(&self) -> Option<&str> {
        non_blank(&self.audio_url)
    }

    /// Artist credit; the API sends `""` when there is none.
    pub fn artist(&self) -> Option<&str> {
        non_blank(&self.artist_name)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Full track payload from `/tracks/{id}/`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackDetail {
    pub id: String,
    pub title: String,
    pub artist_name: Option<String>,
    pub language: Option<String>,
    pub description: String,
    pub lyrics: String,
    pub genre: Option<Genre>,
    pub mood: Option<Mood>,
    pub tags_list: Vec<String>,
    pub duration: f64,
    pub duration_display: String,
    pub bpm: Option<u32>,
    pub download_count: u64,
    pub play_count: u64,
    pub audio_url: Option<String>,
    pub file_size: f64,
    /// Pre-computed peaks for waveform displays.
    pub waveform_data: Option<Vec<f32>>,
    pub is_featured: bool,
    pub created_at: String,
}

impl TrackDetail {
    pub fn artist(&self) -> Option<&str> {
        non_blank(&self.artist_name)
    }

    pub fn language(&self) -> Option<&str> {
        non_blank(&self.language)
    }
}

impl From<&TrackDetail> for TrackSummary {
    fn from(detail: &TrackDetail) -> Self {
        Self {
            id: detail.id.clone(),
            title: detail.title.clone(),
            artist_name: detail.artist_name.clone(),
            language: detail.language.clone(),
            genre_name: detail.genre.as_ref().map(|g| g.name.clone()),
            mood_name: detail.mood.as_ref().map(|m| m.name.clone()),
            duration: detail.duration,
            duration_display: detail.duration_display.clone(),
            bpm: detail.bpm,
            download_count: detail.download_count,
            play_count: detail.play_count,
            audio_url: detail.audio_url.clone(),
            file_size: detail.file_size,
            is_featured: detail.is_featured,
            created_at: detail.created_at.clone(),
        }
    }
}

/// Page-number paginated list envelope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    /// Total matching items across all pages.
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Authenticated account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Token pair returned by login and registration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

/// Fresh access token returned by the refresh endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access: String,
}

/// Coarse player state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// No current track.
    #[default]
    Idle,
    /// A track is loaded but not producing audio.
    Paused,
    /// A track is loaded and playback was requested.
    Playing,
}

/// Read-only projection of the player state handed to display surfaces.
///
/// A snapshot is always a complete copy taken at one point in time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackSnapshot {
    pub current_track: Option<TrackSummary>,
    pub is_playing: bool,
    /// Elapsed seconds.
    pub current_time: f64,
    /// Total seconds, `0.0` until the device reports it.
    pub duration: f64,
    /// Elapsed time as a percentage of `duration`.
    pub progress: f64,
    /// Output gain in `[0, 1]`.
    pub volume: f32,
    pub phase: PlaybackPhase,
    /// Last failure reported by the output device, cleared on the next load.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_summary_decodes_nullable_fields() {
        let raw = r#"{
            "id": "t1",
            "title": "Morning Drive",
            "artist_name": "AI",
            "genre_name": null,
            "mood_name": "Calm",
            "duration": 120,
            "duration_display": "2:00",
            "bpm": null,
            "download_count": 4,
            "play_count": 9,
            "audio_url": null,
            "file_size": 2.4,
            "is_featured": true,
            "created_at": "2025-01-01T00:00:00Z"
        }"#;
        let track: TrackSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.duration, 120.0);
        assert!(track.genre_name.is_none());
        assert_eq!(track.mood_name.as_deref(), Some("Calm"));
        assert!(track.playable_url().is_none());
    }

    #[test]
    fn playable_url_ignores_blank_values() {
        let track = TrackSummary {
            audio_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(track.playable_url().is_none());

        let track = TrackSummary {
            audio_url: Some("https://cdn.example/a.mp3".to_string()),
            ..Default::default()
        };
        assert_eq!(track.playable_url(), Some("https://cdn.example/a.mp3"));
    }

    #[test]
    fn blank_artist_and_language_read_as_missing() {
        let raw = r#"{"id": "t3", "title": "Loop", "artist_name": "", "language": " "}"#;
        let detail: TrackDetail = serde_json::from_str(raw).unwrap();
        assert!(detail.artist().is_none());
        assert!(detail.language().is_none());
        assert!(TrackSummary::from(&detail).artist().is_none());

        let track = TrackSummary {
            artist_name: Some("Kit".to_string()),
            ..Default::default()
        };
        assert_eq!(track.artist(), Some("Kit"));
    }

    #[test]
    fn summary_from_detail_flattens_genre_and_mood() {
        let detail = TrackDetail {
            id: "t2".to_string(),
            title: "Night".to_string(),
            genre: Some(Genre {
                id: 1,
                name: "Ambient".to_string(),
                slug: "ambient".to_string(),
                track_count: 3,
            }),
            mood: None,
            audio_url: Some("b.mp3".to_string()),
            duration: 95.0,
            ..Default::default()
        };
        let summary = TrackSummary::from(&detail);
        assert_eq!(summary.id, "t2");
        assert_eq!(summary.genre_name.as_deref(), Some("Ambient"));
        assert!(summary.mood_name.is_none());
        assert_eq!(summary.audio_url.as_deref(), Some("b.mp3"));
        assert_eq!(summary.duration, 95.0);
    }

    #[test]
    fn page_decodes_results() {
        let raw = r#"{"count": 41, "next": "http://x/?page=2", "previous": null,
            "results": [{"id": "a", "title": "A"}]}"#;
        let page: Page<TrackSummary> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.count, 41);
        assert!(page.previous.is_none());
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].title, "A");
    }

    #[test]
    fn playback_phase_serializes_snake_case() {
        let json = serde_json::to_string(&PlaybackPhase::Playing).unwrap();
        assert_eq!(json, "\"playing\"");
    }
}
