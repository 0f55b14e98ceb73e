//! Catalog models for the SQLite-backed music catalog.
//!
//! These are the read-side projections served by the API. Entities are
//! identified by opaque integer ids, unique within their type.

use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type SongId = i64;
pub type ArtistId = i64;
pub type AlbumId = i64;

// =============================================================================
// Core Entities
// =============================================================================

/// Listener account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// One row of per-song audio characteristics.
///
/// All dimensions except tempo are conventionally bounded to 0.0..=1.0;
/// tempo is in BPM.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatures {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub tempo: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
}

/// Song row with the denormalized context shown in listings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SongSummary {
    pub song_id: SongId,
    pub track_name: String,
    pub duration: Option<i64>,
    pub popularity: i64,
    pub genre: Option<String>,
    pub album_name: Option<String>,
    pub artists: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ArtistRef {
    pub artist_id: ArtistId,
    pub artist_name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AlbumRef {
    pub album_id: AlbumId,
    pub album_name: String,
    pub release_date: Option<String>,
}

/// Full song detail, including its audio features when present.
#[derive(Clone, Debug, Serialize)]
pub struct SongDetail {
    pub song_id: SongId,
    pub track_name: String,
    pub duration: Option<i64>,
    pub popularity: i64,
    pub genre: Option<String>,
    pub spotify_track_id: Option<String>,
    pub album: Option<AlbumRef>,
    pub artists: Vec<ArtistRef>,
    pub audio_features: Option<AudioFeatures>,
}

// =============================================================================
// Listing / Pagination Types
// =============================================================================

/// Artist listing entry. Only artists with at least two songs are listed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub song_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArtistPage {
    pub total_artists: i64,
    pub limit: i64,
    pub offset: i64,
    pub returned: usize,
    pub artists: Vec<ArtistSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArtistDetail {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub created_at: i64,
    pub song_count: i64,
    pub album_count: i64,
    pub avg_popularity: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AlbumSummary {
    pub album_id: AlbumId,
    pub album_name: String,
    pub release_date: Option<String>,
    pub track_count: i64,
    pub artists: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AlbumPage {
    pub total_albums: i64,
    pub limit: i64,
    pub offset: i64,
    pub returned: usize,
    pub albums: Vec<AlbumSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AlbumDetail {
    pub album_id: AlbumId,
    pub album_name: String,
    pub release_date: Option<String>,
    pub track_count: i64,
    pub total_duration: Option<i64>,
    pub avg_popularity: Option<f64>,
    pub artists: Vec<String>,
}

// =============================================================================
// Listening History / Statistics
// =============================================================================

/// One listening event, joined with its song.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub history_id: i64,
    pub played_at: i64,
    #[serde(flatten)]
    pub song: SongSummary,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ArtistPlayCount {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub play_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenrePlayCount {
    pub genre: String,
    pub play_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MostPlayedSong {
    pub song_id: SongId,
    pub track_name: String,
    pub play_count: i64,
    pub artists: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserStatistics {
    pub total_listening_time_seconds: i64,
    pub total_plays: i64,
    pub favorite_genre: Option<GenrePlayCount>,
    pub most_played_song: Option<MostPlayedSong>,
}

/// Song with its recent play count, for the trending listing.
#[derive(Clone, Debug, Serialize)]
pub struct TrendingSong {
    #[serde(flatten)]
    pub song: SongSummary,
    pub recent_play_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TopArtist {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub play_count: i64,
    pub unique_listeners: i64,
}

// =============================================================================
// Feature Filter (POST /api/songs/filter)
// =============================================================================

fn default_max_unit() -> f64 {
    1.0
}

fn default_max_tempo() -> f64 {
    300.0
}

/// Range filter over audio features. Bounds default to the full range.
#[derive(Clone, Debug, Deserialize)]
pub struct FeatureFilter {
    pub genre: Option<String>,
    #[serde(default)]
    pub energy_min: f64,
    #[serde(default = "default_max_unit")]
    pub energy_max: f64,
    #[serde(default)]
    pub danceability_min: f64,
    #[serde(default = "default_max_unit")]
    pub danceability_max: f64,
    #[serde(default)]
    pub tempo_min: f64,
    #[serde(default = "default_max_tempo")]
    pub tempo_max: f64,
    #[serde(default)]
    pub acousticness_min: f64,
    #[serde(default = "default_max_unit")]
    pub acousticness_max: f64,
    #[serde(default)]
    pub valence_min: f64,
    #[serde(default = "default_max_unit")]
    pub valence_max: f64,
}

impl Default for FeatureFilter {
    fn default() -> Self {
        FeatureFilter {
            genre: None,
            energy_min: 0.0,
            energy_max: 1.0,
            danceability_min: 0.0,
            danceability_max: 1.0,
            tempo_min: 0.0,
            tempo_max: 300.0,
            acousticness_min: 0.0,
            acousticness_max: 1.0,
            valence_min: 0.0,
            valence_max: 1.0,
        }
    }
}

// =============================================================================
// Feature rows attributed to an owning entity (for in-memory aggregation)
// =============================================================================

/// One audio-feature row attributed to an artist performing the song.
#[derive(Clone, Debug)]
pub struct ArtistFeatureRow {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub features: AudioFeatures,
}

/// One audio-feature row attributed to the album containing the song.
#[derive(Clone, Debug)]
pub struct AlbumFeatureRow {
    pub album_id: AlbumId,
    pub album_name: String,
    pub release_date: Option<String>,
    pub features: AudioFeatures,
}
