//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per API endpoint. When routes change,
//! update only this file.
#![allow(dead_code)] // Not every test binary uses every endpoint

use super::constants::REQUEST_TIMEOUT_SECS;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed")
    }

    // ========================================================================
    // Health
    // ========================================================================

    pub async fn health(&self) -> Response {
        self.get("/api/health").await
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn list_users(&self) -> Response {
        self.get("/api/users").await
    }

    pub async fn get_user(&self, id: i64) -> Response {
        self.get(&format!("/api/users/{}", id)).await
    }

    pub async fn get_user_history(&self, id: i64) -> Response {
        self.get(&format!("/api/users/{}/history", id)).await
    }

    pub async fn get_user_top_artists(&self, id: i64) -> Response {
        self.get(&format!("/api/users/{}/top-artists", id)).await
    }

    pub async fn get_user_statistics(&self, id: i64) -> Response {
        self.get(&format!("/api/users/{}/statistics", id)).await
    }

    // ========================================================================
    // Songs
    // ========================================================================

    pub async fn list_songs(&self) -> Response {
        self.get("/api/songs").await
    }

    pub async fn get_song(&self, id: i64) -> Response {
        self.get(&format!("/api/songs/{}", id)).await
    }

    pub async fn filter_songs(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/songs/filter", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn get_songs_by_genre(&self, genre: &str) -> Response {
        self.get(&format!("/api/songs/genre/{}", genre)).await
    }

    pub async fn get_popular_songs(&self, limit: usize) -> Response {
        self.get(&format!("/api/songs/popular/top?limit={}", limit))
            .await
    }

    // ========================================================================
    // Artists
    // ========================================================================

    pub async fn list_artists(&self) -> Response {
        self.get("/api/artists").await
    }

    pub async fn get_artist(&self, id: i64) -> Response {
        self.get(&format!("/api/artists/{}", id)).await
    }

    pub async fn get_artist_songs(&self, id: i64) -> Response {
        self.get(&format!("/api/artists/{}/songs", id)).await
    }

    pub async fn get_artist_audio_patterns(&self, id: i64) -> Response {
        self.get(&format!("/api/artists/{}/audio-patterns", id))
            .await
    }

    pub async fn get_similar_artists(&self, id: i64) -> Response {
        self.get(&format!("/api/artists/{}/similar", id)).await
    }

    pub async fn get_top_artists(&self) -> Response {
        self.get("/api/artists/trending/top").await
    }

    // ========================================================================
    // Albums
    // ========================================================================

    pub async fn list_albums(&self) -> Response {
        self.get("/api/albums").await
    }

    pub async fn get_album(&self, id: i64) -> Response {
        self.get(&format!("/api/albums/{}", id)).await
    }

    pub async fn get_album_tracks(&self, id: i64) -> Response {
        self.get(&format!("/api/albums/{}/tracks", id)).await
    }

    pub async fn get_album_audio_features(&self, id: i64) -> Response {
        self.get(&format!("/api/albums/{}/audio-features", id))
            .await
    }

    pub async fn get_similar_albums(&self, id: i64) -> Response {
        self.get(&format!("/api/albums/{}/similar", id)).await
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    pub async fn get_recommendations(&self, user_id: i64) -> Response {
        self.get(&format!("/api/recommendations/user/{}", user_id))
            .await
    }

    pub async fn get_recommendations_with_limit(&self, user_id: i64, limit: usize) -> Response {
        self.get(&format!(
            "/api/recommendations/user/{}?limit={}",
            user_id, limit
        ))
        .await
    }

    pub async fn get_similar_songs(&self, song_id: i64) -> Response {
        self.get(&format!("/api/recommendations/similar-songs/{}", song_id))
            .await
    }

    pub async fn get_trending_songs(&self) -> Response {
        self.get("/api/recommendations/trending").await
    }
}
