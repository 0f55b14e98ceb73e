//! Multi-strategy recommendation composer.
//!
//! Three strategies run for a user with listening history, in a fixed
//! order: songs by artists they already listen to, songs near their
//! aggregate audio-feature profile, and songs from albums they started but
//! never finished. Results are concatenated in strategy order, deduplicated
//! by song id (first occurrence wins, so the surviving
//! `recommendation_reason` names the earliest strategy that found the song)
//! and truncated to the requested limit.
//!
//! A user with no history short-circuits to the popularity fallback.

use super::features::FeatureVector;
use super::scoring::taste_distance;
use crate::catalog_store::{CatalogStore, SongId, SongSummary, UserId};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Per-strategy result cap.
pub const STRATEGY_CAP: usize = 3;

/// Default size of a composed recommendation list.
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    ArtistSimilarity,
    AudioFeatureMatch,
    AlbumExploration,
    PopularRecommendation,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecommendedSong {
    #[serde(flatten)]
    pub song: SongSummary,
    pub recommendation_reason: RecommendationReason,
}

/// Pre-deduplication counts per strategy, plus the size of the final list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StrategyBreakdown {
    pub artist_based: usize,
    pub feature_based: usize,
    pub album_based: usize,
    pub total_unique: usize,
}

#[derive(Clone, Debug)]
pub struct RecommendationSet {
    /// True when the user had no listening history and the popularity
    /// fallback produced the list.
    pub cold_start: bool,
    pub recommendations: Vec<RecommendedSong>,
    pub breakdown: Option<StrategyBreakdown>,
}

fn tag(songs: Vec<SongSummary>, reason: RecommendationReason) -> Vec<RecommendedSong> {
    songs
        .into_iter()
        .map(|song| RecommendedSong {
            song,
            recommendation_reason: reason,
        })
        .collect()
}

pub struct Recommender {
    store: Arc<dyn CatalogStore>,
}

impl Recommender {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Recommender { store }
    }

    pub(super) fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    /// Compose a recommendation list for a user.
    pub fn recommend_for_user(&self, user_id: UserId, limit: usize) -> Result<RecommendationSet> {
        let heard = self.store.listened_song_ids(user_id)?;

        if heard.is_empty() {
            debug!("user {} has no listening history, serving popular songs", user_id);
            let recommendations = tag(
                self.store.popular_songs(limit)?,
                RecommendationReason::PopularRecommendation,
            );
            return Ok(RecommendationSet {
                cold_start: true,
                recommendations,
                breakdown: None,
            });
        }

        let artist_recs = self.artist_based(user_id, &heard)?;
        let feature_recs = self.feature_based(user_id, &heard)?;
        let album_recs = self.album_based(user_id, &heard)?;

        let mut breakdown = StrategyBreakdown {
            artist_based: artist_recs.len(),
            feature_based: feature_recs.len(),
            album_based: album_recs.len(),
            total_unique: 0,
        };

        // Strategy order decides which reason a shared song keeps.
        let mut seen: HashSet<SongId> = HashSet::new();
        let mut merged: Vec<RecommendedSong> = Vec::new();
        for rec in artist_recs
            .into_iter()
            .chain(feature_recs)
            .chain(album_recs)
        {
            if seen.insert(rec.song.song_id) {
                merged.push(rec);
            }
        }
        merged.truncate(limit);
        breakdown.total_unique = merged.len();

        Ok(RecommendationSet {
            cold_start: false,
            recommendations: merged,
            breakdown: Some(breakdown),
        })
    }

    /// Unheard songs by artists present in the user's history.
    fn artist_based(
        &self,
        user_id: UserId,
        heard: &HashSet<SongId>,
    ) -> Result<Vec<RecommendedSong>> {
        let artist_ids = self.store.artist_ids_listened_by(user_id)?;
        if artist_ids.is_empty() {
            return Ok(Vec::new());
        }
        let songs = self
            .store
            .songs_by_artists(&artist_ids, heard, STRATEGY_CAP)?;
        Ok(tag(songs, RecommendationReason::ArtistSimilarity))
    }

    /// Unheard songs closest to the user's aggregate feature profile.
    fn feature_based(
        &self,
        user_id: UserId,
        heard: &HashSet<SongId>,
    ) -> Result<Vec<RecommendedSong>> {
        let rows = self.store.user_feature_rows(user_id)?;
        let Some(taste) = FeatureVector::mean(&rows) else {
            // History exists but none of it has feature rows
            return Ok(Vec::new());
        };

        let candidates = self.store.songs_with_features(heard)?;
        let mut scored: Vec<(f64, SongSummary)> = candidates
            .into_iter()
            .map(|(song, row)| (taste_distance(&FeatureVector::from(&row), &taste), song))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(tag(
            scored
                .into_iter()
                .take(STRATEGY_CAP)
                .map(|(_, song)| song)
                .collect(),
            RecommendationReason::AudioFeatureMatch,
        ))
    }

    /// Unheard songs from albums the user has started but not finished.
    fn album_based(
        &self,
        user_id: UserId,
        heard: &HashSet<SongId>,
    ) -> Result<Vec<RecommendedSong>> {
        let album_ids = self.store.album_ids_partially_explored(user_id)?;
        if album_ids.is_empty() {
            return Ok(Vec::new());
        }
        let songs = self.store.songs_by_albums(&album_ids, heard, STRATEGY_CAP)?;
        Ok(tag(songs, RecommendationReason::AlbumExploration))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{song, StubStore};
    use super::*;
    use crate::recommendation::features::features;

    #[test]
    fn cold_start_serves_popular_songs_only() {
        let mut store = StubStore::default();
        store.popular = vec![song(10, 90), song(11, 80), song(12, 70)];
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        assert!(set.cold_start);
        assert!(set.breakdown.is_none());
        assert_eq!(set.recommendations.len(), 3);
        assert!(set
            .recommendations
            .iter()
            .all(|r| r.recommendation_reason == RecommendationReason::PopularRecommendation));
        // Popularity order is preserved from the store
        let pops: Vec<i64> = set.recommendations.iter().map(|r| r.song.popularity).collect();
        assert_eq!(pops, vec![90, 80, 70]);
    }

    #[test]
    fn cold_start_respects_requested_limit() {
        let mut store = StubStore::default();
        store.popular = (0..10).map(|i| song(i, 100 - i)).collect();
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 4).unwrap();
        assert_eq!(set.recommendations.len(), 4);
    }

    #[test]
    fn duplicate_songs_keep_the_earliest_strategy_reason() {
        let mut store = StubStore::default();
        store.listened.insert(1, [100].into());
        store.artist_ids.insert(1, vec![1]);
        store.artist_songs = vec![song(5, 80), song(6, 70)];
        // Feature strategy would surface songs 5 and 7
        store.user_rows.insert(1, vec![features(0.5, 0.5, 0.5, 120.0, 0.1)]);
        store.features_catalog = vec![
            (song(5, 80), features(0.5, 0.5, 0.5, 120.0, 0.1)),
            (song(7, 10), features(0.6, 0.5, 0.5, 120.0, 0.1)),
        ];
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        let ids: Vec<i64> = set.recommendations.iter().map(|r| r.song.song_id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        // Song 5 was found by both strategies; artist-based listed it first
        assert_eq!(
            set.recommendations[0].recommendation_reason,
            RecommendationReason::ArtistSimilarity
        );
        assert_eq!(
            set.recommendations[2].recommendation_reason,
            RecommendationReason::AudioFeatureMatch
        );

        let breakdown = set.breakdown.unwrap();
        // Counts are pre-deduplication
        assert_eq!(breakdown.artist_based, 2);
        assert_eq!(breakdown.feature_based, 2);
        assert_eq!(breakdown.album_based, 0);
        assert_eq!(breakdown.total_unique, 3);
    }

    #[test]
    fn composed_list_never_exceeds_limit() {
        let mut store = StubStore::default();
        store.listened.insert(1, [100].into());
        store.artist_ids.insert(1, vec![1]);
        store.artist_songs = vec![song(1, 90), song(2, 80), song(3, 70)];
        store.user_rows.insert(1, vec![features(0.5, 0.5, 0.5, 120.0, 0.1)]);
        store.features_catalog = (4..=6)
            .map(|i| (song(i, 50), features(0.5, 0.5, 0.5, 120.0, 0.1)))
            .collect();
        store.album_ids.insert(1, vec![1]);
        store.album_songs = vec![song(7, 40), song(8, 30), song(9, 20)];
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        assert_eq!(set.recommendations.len(), 5);
        assert!(!set.cold_start);
        let breakdown = set.breakdown.unwrap();
        assert_eq!(breakdown.artist_based, 3);
        assert_eq!(breakdown.feature_based, 3);
        assert_eq!(breakdown.album_based, 3);
        assert_eq!(breakdown.total_unique, 5);
    }

    #[test]
    fn strategies_with_missing_prerequisites_are_silently_empty() {
        // History exists, but no artists, no feature rows, no partial albums
        let mut store = StubStore::default();
        store.listened.insert(1, [100].into());
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        assert!(!set.cold_start);
        assert!(set.recommendations.is_empty());
        assert_eq!(
            set.breakdown.unwrap(),
            StrategyBreakdown {
                artist_based: 0,
                feature_based: 0,
                album_based: 0,
                total_unique: 0
            }
        );
    }

    #[test]
    fn feature_strategy_ranks_by_taste_distance() {
        let mut store = StubStore::default();
        store.listened.insert(1, [100].into());
        store.user_rows.insert(1, vec![features(0.8, 0.6, 0.5, 120.0, 0.1)]);
        store.features_catalog = vec![
            (song(1, 10), features(0.1, 0.1, 0.1, 60.0, 0.0)),
            (song(2, 10), features(0.8, 0.6, 0.5, 120.0, 0.9)), // exact on 4 taste dims
            (song(3, 10), features(0.7, 0.6, 0.5, 120.0, 0.1)),
        ];
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        let ids: Vec<i64> = set.recommendations.iter().map(|r| r.song.song_id).collect();
        // Acousticness is ignored by the taste distance, so song 2 is exact
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn single_artist_listener_gets_remaining_catalog_of_that_artist() {
        // User heard 3 songs, all by artist A; artist strategy returns up to
        // 3 other A songs ordered by popularity.
        let mut store = StubStore::default();
        store.listened.insert(1, [1, 2, 3].into());
        store.artist_ids.insert(1, vec![7]);
        store.artist_songs = vec![song(4, 88), song(5, 60), song(6, 31)];
        store.user_rows.insert(1, vec![
            features(0.5, 0.5, 0.5, 120.0, 0.1),
            features(0.6, 0.5, 0.5, 118.0, 0.1),
            features(0.4, 0.5, 0.5, 122.0, 0.1),
        ]);
        store.features_catalog = vec![
            (song(20, 10), features(0.5, 0.5, 0.5, 120.0, 0.1)),
        ];
        store.album_ids.insert(1, vec![3]);
        store.album_songs = vec![song(30, 15)];
        let recommender = Recommender::new(Arc::new(store));

        let set = recommender.recommend_for_user(1, 5).unwrap();
        let ids: Vec<i64> = set.recommendations.iter().map(|r| r.song.song_id).collect();
        assert_eq!(ids, vec![4, 5, 6, 20, 30]);
        assert_eq!(
            set.recommendations[0].recommendation_reason,
            RecommendationReason::ArtistSimilarity
        );
        assert_eq!(set.breakdown.unwrap().total_unique, 5);
    }

    #[test]
    fn reason_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_value(RecommendationReason::ArtistSimilarity).unwrap(),
            "artist_similarity"
        );
        assert_eq!(
            serde_json::to_value(RecommendationReason::AudioFeatureMatch).unwrap(),
            "audio_feature_match"
        );
        assert_eq!(
            serde_json::to_value(RecommendationReason::AlbumExploration).unwrap(),
            "album_exploration"
        );
        assert_eq!(
            serde_json::to_value(RecommendationReason::PopularRecommendation).unwrap(),
            "popular_recommendation"
        );
    }
}
