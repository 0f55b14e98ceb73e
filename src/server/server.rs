use anyhow::Result;
use std::time::{Duration, Instant};

use tracing::error;

use crate::catalog_store::{AudioFeatures, FeatureFilter};
use crate::recommendation::{FeatureProfile, FeatureVector, RecommendationSet, DEFAULT_LIMIT};
use rand::seq::SliceRandom;
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::metrics::{
    metrics_handler, record_error, record_recommendation_served, record_similarity_query,
};
#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::state::*;
use super::{http_cache, log_requests, ServerConfig};

#[derive(Serialize)]
struct HealthStats {
    pub status: &'static str,
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct TrendingQuery {
    limit: Option<usize>,
    days: Option<i64>,
}

/// Recommendation endpoint payload. A cold-start response carries a message
/// instead of the user id and has no strategy breakdown.
#[derive(Serialize)]
struct RecommendationsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    recommendations: Vec<crate::recommendation::RecommendedSong>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy_breakdown: Option<crate::recommendation::StrategyBreakdown>,
}

/// Album feature summary: averages plus the energy/tempo spread.
#[derive(Serialize)]
struct AlbumFeatureSummary {
    #[serde(flatten)]
    profile: FeatureProfile,
    min_energy: f64,
    max_energy: f64,
    min_tempo: f64,
    max_tempo: f64,
}

fn internal_error(endpoint: &'static str, err: anyhow::Error) -> Response {
    error!("{} failed: {:#}", endpoint, err);
    record_error("store_failure", endpoint);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", err)).into_response()
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = HealthStats {
        status: "OK",
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

// =============================================================================
// User Routes
// =============================================================================

async fn list_users(State(store): State<GuardedCatalogStore>) -> Response {
    match store.list_users() {
        Ok(users) => Json(users).into_response(),
        Err(err) => internal_error("list_users", err),
    }
}

async fn get_user(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match store.get_user(id) {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("get_user", err),
    }
}

async fn get_user_history(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.user_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_user_history", err),
        Ok(true) => {}
    }
    match store.user_history(id) {
        Ok(history) => Json(history).into_response(),
        Err(err) => internal_error("get_user_history", err),
    }
}

async fn get_user_top_artists(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match store.user_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_user_top_artists", err),
        Ok(true) => {}
    }
    match store.user_top_artists(id, query.limit.unwrap_or(10)) {
        Ok(top) => Json(top).into_response(),
        Err(err) => internal_error("get_user_top_artists", err),
    }
}

async fn get_user_statistics(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.user_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_user_statistics", err),
        Ok(true) => {}
    }
    match store.user_statistics(id) {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => internal_error("get_user_statistics", err),
    }
}

// =============================================================================
// Song Routes
// =============================================================================

async fn list_songs(State(store): State<GuardedCatalogStore>) -> Response {
    match store.list_songs() {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("list_songs", err),
    }
}

async fn get_song(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match store.get_song(id) {
        Ok(Some(song)) => Json(song).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("get_song", err),
    }
}

async fn filter_songs(
    State(store): State<GuardedCatalogStore>,
    Json(filter): Json<FeatureFilter>,
) -> Response {
    match store.filter_songs(&filter) {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("filter_songs", err),
    }
}

async fn get_songs_by_genre(
    State(store): State<GuardedCatalogStore>,
    Path(genre): Path<String>,
) -> Response {
    match store.songs_by_genre(&genre) {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("get_songs_by_genre", err),
    }
}

async fn get_popular_songs(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match store.popular_songs(query.limit.unwrap_or(10)) {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("get_popular_songs", err),
    }
}

// =============================================================================
// Artist Routes
// =============================================================================

async fn list_artists(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<PageQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(100);
    let offset = query.offset.unwrap_or(0);
    match store.list_artists(limit, offset) {
        Ok(mut page) => {
            // Display shuffle within the page; never part of scoring
            page.artists.shuffle(&mut rand::rng());
            Json(page).into_response()
        }
        Err(err) => internal_error("list_artists", err),
    }
}

async fn get_artist(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match store.get_artist(id) {
        Ok(Some(artist)) => Json(artist).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("get_artist", err),
    }
}

async fn get_artist_songs(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.artist_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_artist_songs", err),
        Ok(true) => {}
    }
    match store.artist_songs(id) {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("get_artist_songs", err),
    }
}

async fn get_artist_audio_patterns(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.artist_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_artist_audio_patterns", err),
        Ok(true) => {}
    }
    match store.artist_feature_rows(id) {
        Ok(rows) => {
            let profile = FeatureVector::mean(&rows).map(FeatureProfile::from);
            Json(profile).into_response()
        }
        Err(err) => internal_error("get_artist_audio_patterns", err),
    }
}

async fn get_similar_artists(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match state.catalog_store.artist_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_similar_artists", err),
        Ok(true) => {}
    }
    match state
        .recommender
        .similar_artists(id, query.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(similar) => {
            record_similarity_query("artist");
            Json(similar).into_response()
        }
        Err(err) => internal_error("get_similar_artists", err),
    }
}

async fn get_top_artists(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match store.top_artists(query.limit.unwrap_or(10)) {
        Ok(top) => Json(top).into_response(),
        Err(err) => internal_error("get_top_artists", err),
    }
}

// =============================================================================
// Album Routes
// =============================================================================

async fn list_albums(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<PageQuery>,
) -> Response {
    match store.list_albums(query.limit.unwrap_or(100), query.offset.unwrap_or(0)) {
        Ok(page) => Json(page).into_response(),
        Err(err) => internal_error("list_albums", err),
    }
}

async fn get_album(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match store.get_album(id) {
        Ok(Some(album)) => Json(album).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("get_album", err),
    }
}

async fn get_album_tracks(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.album_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_album_tracks", err),
        Ok(true) => {}
    }
    match store.album_tracks(id) {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => internal_error("get_album_tracks", err),
    }
}

fn album_feature_summary(rows: &[AudioFeatures]) -> Option<AlbumFeatureSummary> {
    let profile = FeatureVector::mean(rows).map(FeatureProfile::from)?;
    let mut min_energy = f64::INFINITY;
    let mut max_energy = f64::NEG_INFINITY;
    let mut min_tempo = f64::INFINITY;
    let mut max_tempo = f64::NEG_INFINITY;
    for row in rows {
        min_energy = min_energy.min(row.energy);
        max_energy = max_energy.max(row.energy);
        min_tempo = min_tempo.min(row.tempo);
        max_tempo = max_tempo.max(row.tempo);
    }
    Some(AlbumFeatureSummary {
        profile,
        min_energy,
        max_energy,
        min_tempo,
        max_tempo,
    })
}

async fn get_album_audio_features(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.album_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_album_audio_features", err),
        Ok(true) => {}
    }
    match store.album_feature_rows(id) {
        Ok(rows) => Json(album_feature_summary(&rows)).into_response(),
        Err(err) => internal_error("get_album_audio_features", err),
    }
}

async fn get_similar_albums(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match state.catalog_store.album_exists(id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_similar_albums", err),
        Ok(true) => {}
    }
    match state
        .recommender
        .similar_albums(id, query.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(similar) => {
            record_similarity_query("album");
            Json(similar).into_response()
        }
        Err(err) => internal_error("get_similar_albums", err),
    }
}

// =============================================================================
// Recommendation Routes
// =============================================================================

async fn get_recommendations_for_user(
    State(state): State<ServerState>,
    Path(user_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match state.catalog_store.user_exists(user_id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_recommendations_for_user", err),
        Ok(true) => {}
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    match state.recommender.recommend_for_user(user_id, limit) {
        Ok(RecommendationSet {
            cold_start: true,
            recommendations,
            ..
        }) => {
            record_recommendation_served("cold_start");
            Json(RecommendationsResponse {
                user_id: None,
                message: Some("No listening history found. Returning popular songs."),
                recommendations,
                strategy_breakdown: None,
            })
            .into_response()
        }
        Ok(set) => {
            record_recommendation_served("personalized");
            Json(RecommendationsResponse {
                user_id: Some(user_id),
                message: None,
                recommendations: set.recommendations,
                strategy_breakdown: set.breakdown,
            })
            .into_response()
        }
        Err(err) => internal_error("get_recommendations_for_user", err),
    }
}

async fn get_similar_songs(
    State(state): State<ServerState>,
    Path(song_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match state.catalog_store.song_exists(song_id) {
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("get_similar_songs", err),
        Ok(true) => {}
    }
    match state
        .recommender
        .similar_songs(song_id, query.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(similar) => {
            record_similarity_query("song");
            Json(similar).into_response()
        }
        Err(err) => internal_error("get_similar_songs", err),
    }
}

async fn get_trending_songs(
    State(store): State<GuardedCatalogStore>,
    Query(query): Query<TrendingQuery>,
) -> Response {
    let days_back = query.days.unwrap_or(7);
    let since_epoch = chrono::Utc::now().timestamp() - days_back * 86_400;
    match store.trending_songs(since_epoch, query.limit.unwrap_or(10)) {
        Ok(trending) => Json(trending).into_response(),
        Err(err) => internal_error("get_trending_songs", err),
    }
}

// =============================================================================
// App Assembly
// =============================================================================

pub fn make_app(
    config: ServerConfig,
    catalog_store: GuardedCatalogStore,
) -> Result<Router> {
    let recommender = std::sync::Arc::new(crate::recommendation::Recommender::new(
        catalog_store.clone(),
    ));
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        catalog_store,
        recommender,
        hash: env!("GIT_HASH").to_string(),
    };

    let user_routes: Router = Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
        .route("/{id}/history", get(get_user_history))
        .route("/{id}/top-artists", get(get_user_top_artists))
        .route("/{id}/statistics", get(get_user_statistics))
        .with_state(state.clone());

    let song_routes: Router = Router::new()
        .route("/", get(list_songs))
        .route("/{id}", get(get_song))
        .route("/filter", post(filter_songs))
        .route("/genre/{genre}", get(get_songs_by_genre))
        .route("/popular/top", get(get_popular_songs))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let artist_routes: Router = Router::new()
        .route("/", get(list_artists))
        .route("/{id}", get(get_artist))
        .route("/{id}/songs", get(get_artist_songs))
        .route("/{id}/audio-patterns", get(get_artist_audio_patterns))
        .route("/{id}/similar", get(get_similar_artists))
        .route("/trending/top", get(get_top_artists))
        .with_state(state.clone());

    let album_routes: Router = Router::new()
        .route("/", get(list_albums))
        .route("/{id}", get(get_album))
        .route("/{id}/tracks", get(get_album_tracks))
        .route("/{id}/audio-features", get(get_album_audio_features))
        .route("/{id}/similar", get(get_similar_albums))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let recommendation_routes: Router = Router::new()
        .route("/user/{user_id}", get(get_recommendations_for_user))
        .route("/similar-songs/{song_id}", get(get_similar_songs))
        .route("/trending", get(get_trending_songs))
        .with_state(state.clone());

    let api_routes: Router = Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/users", user_routes)
        .nest("/songs", song_routes)
        .nest("/artists", artist_routes)
        .nest("/albums", album_routes)
        .nest("/recommendations", recommendation_routes);

    let root_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new(),
    };

    let mut app: Router = root_router.nest("/api", api_routes);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(catalog_store: GuardedCatalogStore, config: ServerConfig) -> Result<()> {
    let app = make_app(config.clone(), catalog_store)?;

    let metrics_app: Router = Router::new().route("/metrics", get(metrics_handler));
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.metrics_port)).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app).await {
            error!("Metrics server failed: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.port)).await?;

    Ok(axum::serve(listener, app).await?)
}
