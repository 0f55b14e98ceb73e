//! Feature vector extraction.
//!
//! A `FeatureVector` is the numeric audio profile of a single song, or the
//! arithmetic mean over a song set when the subject is an artist, album or a
//! user's listening history. Aggregates are computed in memory from the
//! store's raw rows so the reduction is testable without a database.
//!
//! An empty row set has no profile: `mean` returns `None`, never a zero
//! vector, so downstream scoring cannot mistake "no data" for silence.

use crate::catalog_store::AudioFeatures;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeatureVector {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub tempo: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
}

impl From<&AudioFeatures> for FeatureVector {
    fn from(row: &AudioFeatures) -> Self {
        FeatureVector {
            energy: row.energy,
            danceability: row.danceability,
            valence: row.valence,
            tempo: row.tempo,
            speechiness: row.speechiness,
            acousticness: row.acousticness,
            instrumentalness: row.instrumentalness,
            liveness: row.liveness,
        }
    }
}

impl FeatureVector {
    /// Arithmetic mean per dimension over the given rows, or `None` when
    /// there are no rows.
    pub fn mean(rows: &[AudioFeatures]) -> Option<FeatureVector> {
        if rows.is_empty() {
            return None;
        }
        let n = rows.len() as f64;
        let mut sum = FeatureVector {
            energy: 0.0,
            danceability: 0.0,
            valence: 0.0,
            tempo: 0.0,
            speechiness: 0.0,
            acousticness: 0.0,
            instrumentalness: 0.0,
            liveness: 0.0,
        };
        for row in rows {
            sum.energy += row.energy;
            sum.danceability += row.danceability;
            sum.valence += row.valence;
            sum.tempo += row.tempo;
            sum.speechiness += row.speechiness;
            sum.acousticness += row.acousticness;
            sum.instrumentalness += row.instrumentalness;
            sum.liveness += row.liveness;
        }
        Some(FeatureVector {
            energy: sum.energy / n,
            danceability: sum.danceability / n,
            valence: sum.valence / n,
            tempo: sum.tempo / n,
            speechiness: sum.speechiness / n,
            acousticness: sum.acousticness / n,
            instrumentalness: sum.instrumentalness / n,
            liveness: sum.liveness / n,
        })
    }
}

/// Averaged profile with the field names the API exposes on the
/// audio-patterns endpoints.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FeatureProfile {
    pub avg_energy: f64,
    pub avg_danceability: f64,
    pub avg_tempo: f64,
    pub avg_speechiness: f64,
    pub avg_acousticness: f64,
    pub avg_instrumentalness: f64,
    pub avg_liveness: f64,
    pub avg_valence: f64,
}

impl From<FeatureVector> for FeatureProfile {
    fn from(v: FeatureVector) -> Self {
        FeatureProfile {
            avg_energy: v.energy,
            avg_danceability: v.danceability,
            avg_tempo: v.tempo,
            avg_speechiness: v.speechiness,
            avg_acousticness: v.acousticness,
            avg_instrumentalness: v.instrumentalness,
            avg_liveness: v.liveness,
            avg_valence: v.valence,
        }
    }
}

#[cfg(test)]
pub(crate) fn features(
    energy: f64,
    danceability: f64,
    valence: f64,
    tempo: f64,
    acousticness: f64,
) -> AudioFeatures {
    AudioFeatures {
        energy,
        danceability,
        valence,
        tempo,
        speechiness: 0.05,
        acousticness,
        instrumentalness: 0.0,
        liveness: 0.1,
    }
}
