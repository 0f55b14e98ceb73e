//! CatalogStore trait definition.
//!
//! Abstracts catalog queries behind a trait so handlers and the
//! recommendation engine can be exercised against stub implementations in
//! tests. The store is a read-only consumer of the catalog: entities and
//! listening events are seeded externally and never mutated here.

use super::models::*;
use anyhow::Result;
use std::collections::HashSet;

pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Existence Checks / Counts
    // =========================================================================

    fn user_exists(&self, id: UserId) -> Result<bool>;
    fn song_exists(&self, id: SongId) -> Result<bool>;
    fn artist_exists(&self, id: ArtistId) -> Result<bool>;
    fn album_exists(&self, id: AlbumId) -> Result<bool>;

    /// Per-type row counts, used for startup logging and metrics gauges.
    fn users_count(&self) -> usize;
    fn songs_count(&self) -> usize;
    fn artists_count(&self) -> usize;
    fn albums_count(&self) -> usize;

    // =========================================================================
    // Users
    // =========================================================================

    fn list_users(&self) -> Result<Vec<User>>;

    fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// A user's listening history, most recent first.
    fn user_history(&self, id: UserId) -> Result<Vec<HistoryEntry>>;

    /// Artists ranked by the user's play count.
    fn user_top_artists(&self, id: UserId, limit: usize) -> Result<Vec<ArtistPlayCount>>;

    fn user_statistics(&self, id: UserId) -> Result<UserStatistics>;

    // =========================================================================
    // Songs
    // =========================================================================

    /// All songs, most popular first.
    fn list_songs(&self) -> Result<Vec<SongSummary>>;

    fn get_song(&self, id: SongId) -> Result<Option<SongDetail>>;

    fn songs_by_genre(&self, genre: &str) -> Result<Vec<SongSummary>>;

    fn filter_songs(&self, filter: &FeatureFilter) -> Result<Vec<SongSummary>>;

    /// Catalog-wide songs ordered by popularity descending.
    fn popular_songs(&self, limit: usize) -> Result<Vec<SongSummary>>;

    /// Songs with plays recorded since `since_epoch`, ordered by recent play
    /// count then popularity.
    fn trending_songs(&self, since_epoch: i64, limit: usize) -> Result<Vec<TrendingSong>>;

    // =========================================================================
    // Artists
    // =========================================================================

    /// Paginated artist listing. Only artists with at least two songs are
    /// included; `total_artists` counts the same population.
    fn list_artists(&self, limit: i64, offset: i64) -> Result<ArtistPage>;

    fn get_artist(&self, id: ArtistId) -> Result<Option<ArtistDetail>>;

    /// All songs performed by the artist, most popular first.
    fn artist_songs(&self, id: ArtistId) -> Result<Vec<SongSummary>>;

    /// Artists ranked by total play count across all users.
    fn top_artists(&self, limit: usize) -> Result<Vec<TopArtist>>;

    // =========================================================================
    // Albums
    // =========================================================================

    fn list_albums(&self, limit: i64, offset: i64) -> Result<AlbumPage>;

    fn get_album(&self, id: AlbumId) -> Result<Option<AlbumDetail>>;

    /// Album tracks in song-id order.
    fn album_tracks(&self, id: AlbumId) -> Result<Vec<SongSummary>>;

    // =========================================================================
    // Recommendation Support
    // =========================================================================

    /// The set of song ids the user has ever listened to.
    fn listened_song_ids(&self, user_id: UserId) -> Result<HashSet<SongId>>;

    /// A single song's audio-feature row, if it has one.
    fn feature_row(&self, song_id: SongId) -> Result<Option<AudioFeatures>>;

    /// Feature rows of every song in the user's listening history. Songs
    /// without a feature row are omitted, not zeroed.
    fn user_feature_rows(&self, user_id: UserId) -> Result<Vec<AudioFeatures>>;

    /// Feature rows of every song performed by the artist.
    fn artist_feature_rows(&self, artist_id: ArtistId) -> Result<Vec<AudioFeatures>>;

    /// Feature rows of every song on the album.
    fn album_feature_rows(&self, album_id: AlbumId) -> Result<Vec<AudioFeatures>>;

    /// Distinct ids of artists whose songs appear in the user's history.
    fn artist_ids_listened_by(&self, user_id: UserId) -> Result<Vec<ArtistId>>;

    /// Albums the user has started but not finished: at least one song
    /// heard, fewer than all.
    fn album_ids_partially_explored(&self, user_id: UserId) -> Result<Vec<AlbumId>>;

    /// Songs by any of the given artists, minus the exclusion set, ordered
    /// by popularity descending (song id as tie-break), capped.
    fn songs_by_artists(
        &self,
        artist_ids: &[ArtistId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>>;

    /// Songs on any of the given albums, minus the exclusion set, ordered
    /// by popularity descending (song id as tie-break), capped.
    fn songs_by_albums(
        &self,
        album_ids: &[AlbumId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>>;

    /// Every song that has a feature row, minus the exclusion set, in song
    /// id order.
    fn songs_with_features(
        &self,
        excluding: &HashSet<SongId>,
    ) -> Result<Vec<(SongSummary, AudioFeatures)>>;

    /// Every (artist, song-feature) pairing in the catalog, ordered by
    /// artist id. Aggregation into per-artist profiles happens in memory.
    fn all_artist_feature_rows(&self) -> Result<Vec<ArtistFeatureRow>>;

    /// Every (album, song-feature) pairing in the catalog, ordered by album
    /// id. Aggregation into per-album profiles happens in memory.
    fn all_album_feature_rows(&self) -> Result<Vec<AlbumFeatureRow>>;
}
