//! Dissimilarity scoring between feature vectors.
//!
//! Weighted L1 distance; tempo is divided by a fixed 100 so its BPM scale
//! roughly matches the 0..1 dimensions. Each call site uses its own
//! dimension subset and the subsets are kept as separate functions on
//! purpose: unifying them would silently change existing rankings.

use super::features::FeatureVector;

/// Song-to-song distance over five dimensions.
pub fn track_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    (a.energy - b.energy).abs()
        + (a.danceability - b.danceability).abs()
        + (a.valence - b.valence).abs()
        + (a.tempo - b.tempo).abs() / 100.0
        + (a.acousticness - b.acousticness).abs()
}

/// Distance between a candidate song and a user's aggregate listening
/// profile, over four dimensions.
pub fn taste_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    (a.energy - b.energy).abs()
        + (a.danceability - b.danceability).abs()
        + (a.valence - b.valence).abs()
        + (a.tempo - b.tempo).abs() / 100.0
}

/// Artist-to-artist / album-to-album distance over the three bounded mood
/// dimensions.
pub fn profile_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    (a.energy - b.energy).abs()
        + (a.danceability - b.danceability).abs()
        + (a.valence - b.valence).abs()
}

#[cfg(test)]
mod tests {
    use super::super::features::features;
    use super::*;
    use crate::recommendation::FeatureVector;

    fn vector(
        energy: f64,
        danceability: f64,
        valence: f64,
        tempo: f64,
        acousticness: f64,
    ) -> FeatureVector {
        FeatureVector::from(&features(energy, danceability, valence, tempo, acousticness))
    }

    #[test]
    fn distance_to_self_is_zero() {
        let v = vector(0.8, 0.6, 0.5, 120.0, 0.1);
        assert_eq!(track_distance(&v, &v), 0.0);
        assert_eq!(taste_distance(&v, &v), 0.0);
        assert_eq!(profile_distance(&v, &v), 0.0);
    }

    #[test]
    fn distances_are_symmetric() {
        let a = vector(0.8, 0.6, 0.5, 120.0, 0.1);
        let b = vector(0.3, 0.9, 0.2, 95.0, 0.7);
        assert_eq!(track_distance(&a, &b), track_distance(&b, &a));
        assert_eq!(taste_distance(&a, &b), taste_distance(&b, &a));
        assert_eq!(profile_distance(&a, &b), profile_distance(&b, &a));
    }

    #[test]
    fn tempo_is_down_weighted_by_100() {
        let a = vector(0.5, 0.5, 0.5, 100.0, 0.5);
        let b = vector(0.5, 0.5, 0.5, 150.0, 0.5);
        assert!((track_distance(&a, &b) - 0.5).abs() < 1e-12);
        assert!((taste_distance(&a, &b) - 0.5).abs() < 1e-12);
        // Tempo does not participate in the three-dimension profile distance
        assert_eq!(profile_distance(&a, &b), 0.0);
    }

    #[test]
    fn acousticness_only_counts_for_tracks() {
        let a = vector(0.5, 0.5, 0.5, 120.0, 0.0);
        let b = vector(0.5, 0.5, 0.5, 120.0, 1.0);
        assert!((track_distance(&a, &b) - 1.0).abs() < 1e-12);
        assert_eq!(taste_distance(&a, &b), 0.0);
        assert_eq!(profile_distance(&a, &b), 0.0);
    }

    #[test]
    fn distances_sum_absolute_differences() {
        let a = vector(0.8, 0.6, 0.5, 120.0, 0.1);
        let b = vector(0.6, 0.9, 0.4, 100.0, 0.3);
        let expected = 0.2 + 0.3 + 0.1 + 0.2 + 0.2;
        assert!((track_distance(&a, &b) - expected).abs() < 1e-12);
        assert!((taste_distance(&a, &b) - (expected - 0.2)).abs() < 1e-12);
        assert!((profile_distance(&a, &b) - 0.6).abs() < 1e-12);
    }
}
