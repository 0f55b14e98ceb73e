//! Test fixture creation for the catalog database
//!
//! The catalog is read-only through the API, so fixtures seed it with
//! direct SQL inserts after the store has created the schema.

use super::constants::*;
use anyhow::Result;
use melodex_server::catalog_store::SqliteCatalogStore;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

/// Creates a temporary catalog: 2 users, 3 artists, 2 albums, 9 songs
/// (audio features on all but 'Driftwood'), and listening history for the
/// first user.
///
/// Returns (temp_dir, catalog_db_path).
pub fn create_test_catalog() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let catalog_db_path = dir.path().join("catalog.db");

    // Initialize the store once so it creates the schema
    let _store = SqliteCatalogStore::new(&catalog_db_path)?;

    let conn = Connection::open(&catalog_db_path)?;

    conn.execute_batch(
        "INSERT INTO users (user_id, username, email) VALUES
             (1, 'listener', 'listener@example.com'),
             (2, 'newcomer', 'newcomer@example.com');

         INSERT INTO artists (artist_id, artist_name) VALUES
             (1, 'Glass Harbor'),
             (2, 'Midnight Circuit'),
             (3, 'Quiet Pines');

         INSERT INTO albums (album_id, album_name, release_date) VALUES
             (1, 'Undertow', '2021-03-12'),
             (2, 'Neon Maps', '2022-09-02');

         INSERT INTO songs (song_id, track_name, album_id, duration, popularity, genre) VALUES
             (1, 'Riptide', 1, 214, 71, 'indie'),
             (2, 'Salt Air', 1, 198, 55, 'indie'),
             (3, 'Harbor Lights', 1, 230, 48, 'indie'),
             (4, 'Breakwater', 1, 205, 66, 'indie'),
             (5, 'Gridline', 2, 241, 80, 'synthwave'),
             (6, 'Afterimage', 2, 189, 62, 'synthwave'),
             (7, 'Vector City', 2, 222, 58, 'synthwave'),
             (8, 'Clearing', NULL, 275, 33, 'ambient'),
             (9, 'Driftwood', NULL, 242, 20, 'ambient');

         INSERT INTO song_artists (song_id, artist_id) VALUES
             (1, 1), (2, 1), (3, 1), (4, 1),
             (5, 2), (6, 2), (7, 2),
             (8, 3), (9, 3);

         INSERT INTO audio_features
             (song_id, energy, danceability, valence, tempo, speechiness, acousticness, instrumentalness, liveness)
         VALUES
             (1, 0.80, 0.60, 0.50, 120.0, 0.05, 0.10, 0.00, 0.12),
             (2, 0.70, 0.55, 0.45, 115.0, 0.04, 0.20, 0.01, 0.10),
             (3, 0.65, 0.50, 0.40, 118.0, 0.05, 0.25, 0.02, 0.11),
             (4, 0.75, 0.58, 0.48, 122.0, 0.05, 0.15, 0.00, 0.13),
             (5, 0.90, 0.80, 0.70, 128.0, 0.06, 0.02, 0.20, 0.15),
             (6, 0.85, 0.75, 0.65, 124.0, 0.05, 0.05, 0.30, 0.11),
             (7, 0.88, 0.78, 0.68, 126.0, 0.06, 0.04, 0.25, 0.14),
             (8, 0.20, 0.30, 0.40,  80.0, 0.03, 0.80, 0.90, 0.09);",
    )?;

    // Listening history for the listener: Riptide twice, Salt Air once,
    // with recent timestamps so the trending window picks them up.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64;
    let plays = [
        (USER_LISTENER_ID, SONG_RIPTIDE_ID, now - 7200),
        (USER_LISTENER_ID, SONG_RIPTIDE_ID, now - 3600),
        (USER_LISTENER_ID, SONG_SALT_AIR_ID, now - 1800),
    ];
    for (user_id, song_id, played_at) in plays {
        conn.execute(
            "INSERT INTO listening_history (user_id, song_id, played_at) VALUES (?1, ?2, ?3)",
            params![user_id, song_id, played_at],
        )?;
    }

    Ok((dir, catalog_db_path))
}
