//! Nearest-neighbor similarity queries for songs, artists and albums.
//!
//! The subject's vector is compared against every other eligible entity of
//! the same type; results come back in ascending distance order, subject
//! always excluded by id. A subject without usable feature data yields an
//! empty list, not an error.

use super::engine::Recommender;
use super::features::FeatureVector;
use super::scoring::{profile_distance, track_distance};
use crate::catalog_store::{
    AlbumFeatureRow, AlbumId, ArtistFeatureRow, ArtistId, AudioFeatures, SongId, SongSummary,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Serialize)]
pub struct SimilarSong {
    #[serde(flatten)]
    pub song: SongSummary,
    pub similarity_score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimilarArtist {
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub avg_energy: f64,
    pub avg_danceability: f64,
    pub avg_valence: f64,
    pub similarity_score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimilarAlbum {
    pub album_id: AlbumId,
    pub album_name: String,
    pub release_date: Option<String>,
    pub avg_energy: f64,
    pub avg_danceability: f64,
    pub avg_valence: f64,
    pub similarity_score: f64,
}

/// Group per-song rows into per-artist buckets, preserving first-seen order.
fn group_artist_rows(
    rows: Vec<ArtistFeatureRow>,
    exclude: ArtistId,
) -> Vec<(ArtistId, String, Vec<AudioFeatures>)> {
    let mut grouped: Vec<(ArtistId, String, Vec<AudioFeatures>)> = Vec::new();
    let mut index: HashMap<ArtistId, usize> = HashMap::new();
    for row in rows {
        if row.artist_id == exclude {
            continue;
        }
        match index.get(&row.artist_id) {
            Some(&i) => grouped[i].2.push(row.features),
            None => {
                index.insert(row.artist_id, grouped.len());
                grouped.push((row.artist_id, row.artist_name, vec![row.features]));
            }
        }
    }
    grouped
}

fn group_album_rows(
    rows: Vec<AlbumFeatureRow>,
    exclude: AlbumId,
) -> Vec<(AlbumId, String, Option<String>, Vec<AudioFeatures>)> {
    let mut grouped: Vec<(AlbumId, String, Option<String>, Vec<AudioFeatures>)> = Vec::new();
    let mut index: HashMap<AlbumId, usize> = HashMap::new();
    for row in rows {
        if row.album_id == exclude {
            continue;
        }
        match index.get(&row.album_id) {
            Some(&i) => grouped[i].3.push(row.features),
            None => {
                index.insert(row.album_id, grouped.len());
                grouped.push((
                    row.album_id,
                    row.album_name,
                    row.release_date,
                    vec![row.features],
                ));
            }
        }
    }
    grouped
}

impl Recommender {
    /// Songs closest to the given song's feature row.
    pub fn similar_songs(&self, song_id: SongId, limit: usize) -> Result<Vec<SimilarSong>> {
        let Some(target_row) = self.store().feature_row(song_id)? else {
            return Ok(Vec::new());
        };
        let target = FeatureVector::from(&target_row);

        let excluding = HashSet::from([song_id]);
        let candidates = self.store().songs_with_features(&excluding)?;

        let mut scored: Vec<SimilarSong> = candidates
            .into_iter()
            .map(|(song, row)| SimilarSong {
                similarity_score: track_distance(&FeatureVector::from(&row), &target),
                song,
            })
            .collect();
        scored.sort_by(|a, b| a.similarity_score.total_cmp(&b.similarity_score));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Artists whose averaged song profiles are closest to this artist's.
    pub fn similar_artists(&self, artist_id: ArtistId, limit: usize) -> Result<Vec<SimilarArtist>> {
        let rows = self.store().artist_feature_rows(artist_id)?;
        let Some(target) = FeatureVector::mean(&rows) else {
            return Ok(Vec::new());
        };

        let grouped = group_artist_rows(self.store().all_artist_feature_rows()?, artist_id);
        let mut scored: Vec<SimilarArtist> = grouped
            .into_iter()
            .filter_map(|(id, name, bucket)| {
                FeatureVector::mean(&bucket).map(|profile| SimilarArtist {
                    artist_id: id,
                    artist_name: name,
                    avg_energy: profile.energy,
                    avg_danceability: profile.danceability,
                    avg_valence: profile.valence,
                    similarity_score: profile_distance(&profile, &target),
                })
            })
            .collect();
        scored.sort_by(|a, b| a.similarity_score.total_cmp(&b.similarity_score));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Albums whose averaged song profiles are closest to this album's.
    pub fn similar_albums(&self, album_id: AlbumId, limit: usize) -> Result<Vec<SimilarAlbum>> {
        let rows = self.store().album_feature_rows(album_id)?;
        let Some(target) = FeatureVector::mean(&rows) else {
            return Ok(Vec::new());
        };

        let grouped = group_album_rows(self.store().all_album_feature_rows()?, album_id);
        let mut scored: Vec<SimilarAlbum> = grouped
            .into_iter()
            .filter_map(|(id, name, release_date, bucket)| {
                FeatureVector::mean(&bucket).map(|profile| SimilarAlbum {
                    album_id: id,
                    album_name: name,
                    release_date,
                    avg_energy: profile.energy,
                    avg_danceability: profile.danceability,
                    avg_valence: profile.valence,
                    similarity_score: profile_distance(&profile, &target),
                })
            })
            .collect();
        scored.sort_by(|a, b| a.similarity_score.total_cmp(&b.similarity_score));
        scored.truncate(limit);
        Ok(scored)
    }
}
