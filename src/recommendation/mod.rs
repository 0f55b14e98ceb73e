mod engine;
mod features;
mod scoring;
mod similar;

#[cfg(test)]
mod test_support;

pub use engine::{
    RecommendationReason, RecommendationSet, RecommendedSong, Recommender, StrategyBreakdown,
    DEFAULT_LIMIT, STRATEGY_CAP,
};
pub use features::{FeatureProfile, FeatureVector};
pub use scoring::{profile_distance, taste_distance, track_distance};
pub use similar::{SimilarAlbum, SimilarArtist, SimilarSong};
