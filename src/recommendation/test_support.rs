//! Stub catalog store for exercising the recommendation engine without a
//! database. Only the queries the engine touches are implemented; the rest
//! are unreachable in these tests.

use crate::catalog_store::*;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

pub(crate) fn song(id: SongId, popularity: i64) -> SongSummary {
    SongSummary {
        song_id: id,
        track_name: format!("Track {}", id),
        duration: Some(200),
        popularity,
        genre: None,
        album_name: None,
        artists: vec![format!("Artist of {}", id)],
    }
}

#[derive(Default)]
pub(crate) struct StubStore {
    pub listened: HashMap<UserId, HashSet<SongId>>,
    pub artist_ids: HashMap<UserId, Vec<ArtistId>>,
    pub album_ids: HashMap<UserId, Vec<AlbumId>>,
    pub user_rows: HashMap<UserId, Vec<AudioFeatures>>,
    pub song_rows: HashMap<SongId, AudioFeatures>,
    pub artist_rows: HashMap<ArtistId, Vec<AudioFeatures>>,
    pub album_rows: HashMap<AlbumId, Vec<AudioFeatures>>,
    /// Returned by `songs_by_artists` before exclusion/cap.
    pub artist_songs: Vec<SongSummary>,
    /// Returned by `songs_by_albums` before exclusion/cap.
    pub album_songs: Vec<SongSummary>,
    pub features_catalog: Vec<(SongSummary, AudioFeatures)>,
    pub artist_catalog: Vec<ArtistFeatureRow>,
    pub album_catalog: Vec<AlbumFeatureRow>,
    pub popular: Vec<SongSummary>,
}

fn apply_exclusion_and_cap(
    songs: &[SongSummary],
    excluding: &HashSet<SongId>,
    cap: usize,
) -> Vec<SongSummary> {
    songs
        .iter()
        .filter(|s| !excluding.contains(&s.song_id))
        .take(cap)
        .cloned()
        .collect()
}

impl CatalogStore for StubStore {
    fn user_exists(&self, _id: UserId) -> Result<bool> {
        Ok(true)
    }

    fn song_exists(&self, _id: SongId) -> Result<bool> {
        unimplemented!()
    }

    fn artist_exists(&self, _id: ArtistId) -> Result<bool> {
        unimplemented!()
    }

    fn album_exists(&self, _id: AlbumId) -> Result<bool> {
        unimplemented!()
    }

    fn users_count(&self) -> usize {
        unimplemented!()
    }

    fn songs_count(&self) -> usize {
        unimplemented!()
    }

    fn artists_count(&self) -> usize {
        unimplemented!()
    }

    fn albums_count(&self) -> usize {
        unimplemented!()
    }

    fn list_users(&self) -> Result<Vec<User>> {
        unimplemented!()
    }

    fn get_user(&self, _id: UserId) -> Result<Option<User>> {
        unimplemented!()
    }

    fn user_history(&self, _id: UserId) -> Result<Vec<HistoryEntry>> {
        unimplemented!()
    }

    fn user_top_artists(&self, _id: UserId, _limit: usize) -> Result<Vec<ArtistPlayCount>> {
        unimplemented!()
    }

    fn user_statistics(&self, _id: UserId) -> Result<UserStatistics> {
        unimplemented!()
    }

    fn list_songs(&self) -> Result<Vec<SongSummary>> {
        unimplemented!()
    }

    fn get_song(&self, _id: SongId) -> Result<Option<SongDetail>> {
        unimplemented!()
    }

    fn songs_by_genre(&self, _genre: &str) -> Result<Vec<SongSummary>> {
        unimplemented!()
    }

    fn filter_songs(&self, _filter: &FeatureFilter) -> Result<Vec<SongSummary>> {
        unimplemented!()
    }

    fn popular_songs(&self, limit: usize) -> Result<Vec<SongSummary>> {
        Ok(self.popular.iter().take(limit).cloned().collect())
    }

    fn trending_songs(&self, _since_epoch: i64, _limit: usize) -> Result<Vec<TrendingSong>> {
        unimplemented!()
    }

    fn list_artists(&self, _limit: i64, _offset: i64) -> Result<ArtistPage> {
        unimplemented!()
    }

    fn get_artist(&self, _id: ArtistId) -> Result<Option<ArtistDetail>> {
        unimplemented!()
    }

    fn artist_songs(&self, _id: ArtistId) -> Result<Vec<SongSummary>> {
        unimplemented!()
    }

    fn top_artists(&self, _limit: usize) -> Result<Vec<TopArtist>> {
        unimplemented!()
    }

    fn list_albums(&self, _limit: i64, _offset: i64) -> Result<AlbumPage> {
        unimplemented!()
    }

    fn get_album(&self, _id: AlbumId) -> Result<Option<AlbumDetail>> {
        unimplemented!()
    }

    fn album_tracks(&self, _id: AlbumId) -> Result<Vec<SongSummary>> {
        unimplemented!()
    }

    fn listened_song_ids(&self, user_id: UserId) -> Result<HashSet<SongId>> {
        Ok(self.listened.get(&user_id).cloned().unwrap_or_default())
    }

    fn feature_row(&self, song_id: SongId) -> Result<Option<AudioFeatures>> {
        Ok(self.song_rows.get(&song_id).copied())
    }

    fn user_feature_rows(&self, user_id: UserId) -> Result<Vec<AudioFeatures>> {
        Ok(self.user_rows.get(&user_id).cloned().unwrap_or_default())
    }

    fn artist_feature_rows(&self, artist_id: ArtistId) -> Result<Vec<AudioFeatures>> {
        Ok(self.artist_rows.get(&artist_id).cloned().unwrap_or_default())
    }

    fn album_feature_rows(&self, album_id: AlbumId) -> Result<Vec<AudioFeatures>> {
        Ok(self.album_rows.get(&album_id).cloned().unwrap_or_default())
    }

    fn artist_ids_listened_by(&self, user_id: UserId) -> Result<Vec<ArtistId>> {
        Ok(self.artist_ids.get(&user_id).cloned().unwrap_or_default())
    }

    fn album_ids_partially_explored(&self, user_id: UserId) -> Result<Vec<AlbumId>> {
        Ok(self.album_ids.get(&user_id).cloned().unwrap_or_default())
    }

    fn songs_by_artists(
        &self,
        _artist_ids: &[ArtistId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>> {
        Ok(apply_exclusion_and_cap(&self.artist_songs, excluding, cap))
    }

    fn songs_by_albums(
        &self,
        _album_ids: &[AlbumId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>> {
        Ok(apply_exclusion_and_cap(&self.album_songs, excluding, cap))
    }

    fn songs_with_features(
        &self,
        excluding: &HashSet<SongId>,
    ) -> Result<Vec<(SongSummary, AudioFeatures)>> {
        Ok(self
            .features_catalog
            .iter()
            .filter(|(s, _)| !excluding.contains(&s.song_id))
            .cloned()
            .collect())
    }

    fn all_artist_feature_rows(&self) -> Result<Vec<ArtistFeatureRow>> {
        Ok(self.artist_catalog.clone())
    }

    fn all_album_feature_rows(&self) -> Result<Vec<AlbumFeatureRow>> {
        Ok(self.album_catalog.clone())
    }
}
