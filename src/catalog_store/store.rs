//! SQLite-backed catalog store implementation.
//!
//! All catalog reads go through a small round-robin pool of read-only
//! connections. A single read-write connection is used only to create or
//! migrate the schema at startup; the API never writes to the catalog.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, types::Value, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

const READ_POOL_SIZE: usize = 4;

const SONG_SUMMARY_SELECT: &str = "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
     FROM songs s
     LEFT JOIN albums a ON a.album_id = s.album_id";

const FEATURE_COLUMNS: &str = "af.energy, af.danceability, af.valence, af.tempo, af.speechiness, af.acousticness, af.instrumentalness, af.liveness";

#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    _write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = CATALOG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &CATALOG_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating catalog db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

/// "?, ?, ..." with one placeholder per element.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        migrate_if_needed(&mut write_conn)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let mut read_pool = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteCatalogStore {
            _write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        info!(
            "Opened music catalog: {} users, {} artists, {} albums, {} songs",
            store.users_count(),
            store.artists_count(),
            store.albums_count(),
            store.songs_count()
        );

        Ok(store)
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn count_table(&self, table: &str) -> usize {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    fn exists(&self, table: &str, id_column: &str, id: i64) -> Result<bool> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE {} = ?1", table, id_column),
                params![id],
                |_| Ok(()),
            )
            .map(|_| true);
        match found {
            Ok(v) => Ok(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    /// Names of the artists on a song, alphabetical.
    fn song_artist_names(conn: &Connection, song_id: SongId) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT ar.artist_name FROM song_artists sa
             JOIN artists ar ON ar.artist_id = sa.artist_id
             WHERE sa.song_id = ?1
             ORDER BY ar.artist_name",
        )?;
        let names = stmt
            .query_map(params![song_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Distinct artist names across an album's songs, alphabetical.
    fn album_artist_names(conn: &Connection, album_id: AlbumId) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT ar.artist_name FROM artists ar
             JOIN song_artists sa ON sa.artist_id = ar.artist_id
             JOIN songs s ON s.song_id = sa.song_id
             WHERE s.album_id = ?1
             ORDER BY ar.artist_name",
        )?;
        let names = stmt
            .query_map(params![album_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn parse_song_summary(row: &rusqlite::Row) -> rusqlite::Result<SongSummary> {
        Ok(SongSummary {
            song_id: row.get(0)?,
            track_name: row.get(1)?,
            duration: row.get(2)?,
            popularity: row.get(3)?,
            genre: row.get(4)?,
            album_name: row.get(5)?,
            artists: Vec::new(),
        })
    }

    /// Parse an AudioFeatures block starting at `offset` in the row.
    fn parse_features_at(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<AudioFeatures> {
        Ok(AudioFeatures {
            energy: row.get(offset)?,
            danceability: row.get(offset + 1)?,
            valence: row.get(offset + 2)?,
            tempo: row.get(offset + 3)?,
            speechiness: row.get(offset + 4)?,
            acousticness: row.get(offset + 5)?,
            instrumentalness: row.get(offset + 6)?,
            liveness: row.get(offset + 7)?,
        })
    }

    /// Run a song-summary query, then fill in artist names per song.
    fn collect_song_summaries<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        query_params: P,
    ) -> Result<Vec<SongSummary>> {
        let mut stmt = conn.prepare(sql)?;
        let mut songs: Vec<SongSummary> = stmt
            .query_map(query_params, Self::parse_song_summary)?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for song in &mut songs {
            song.artists = Self::song_artist_names(conn, song.song_id)?;
        }
        Ok(songs)
    }

    fn feature_row_inner(conn: &Connection, song_id: SongId) -> Result<Option<AudioFeatures>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM audio_features af WHERE af.song_id = ?1",
            FEATURE_COLUMNS
        ))?;
        match stmt.query_row(params![song_id], |row| Self::parse_features_at(row, 0)) {
            Ok(features) => Ok(Some(features)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn feature_rows_for<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        query_params: P,
    ) -> Result<Vec<AudioFeatures>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(query_params, |row| Self::parse_features_at(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl CatalogStore for SqliteCatalogStore {
    // =========================================================================
    // Existence Checks / Counts
    // =========================================================================

    fn user_exists(&self, id: UserId) -> Result<bool> {
        self.exists("users", "user_id", id)
    }

    fn song_exists(&self, id: SongId) -> Result<bool> {
        self.exists("songs", "song_id", id)
    }

    fn artist_exists(&self, id: ArtistId) -> Result<bool> {
        self.exists("artists", "artist_id", id)
    }

    fn album_exists(&self, id: AlbumId) -> Result<bool> {
        self.exists("albums", "album_id", id)
    }

    fn users_count(&self) -> usize {
        self.count_table("users")
    }

    fn songs_count(&self) -> usize {
        self.count_table("songs")
    }

    fn artists_count(&self) -> usize {
        self.count_table("artists")
    }

    fn albums_count(&self) -> usize {
        self.count_table("albums")
    }

    // =========================================================================
    // Users
    // =========================================================================

    fn list_users(&self) -> Result<Vec<User>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT user_id, username, email FROM users ORDER BY user_id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT user_id, username, email FROM users WHERE user_id = ?1")?;
        match stmt.query_row(params![id], |row| {
            Ok(User {
                user_id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
            })
        }) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn user_history(&self, id: UserId) -> Result<Vec<HistoryEntry>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT lh.history_id, lh.played_at,
                    s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             FROM listening_history lh
             JOIN songs s ON s.song_id = lh.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE lh.user_id = ?1
             ORDER BY lh.played_at DESC, lh.history_id DESC",
        )?;
        let mut entries: Vec<HistoryEntry> = stmt
            .query_map(params![id], |row| {
                Ok(HistoryEntry {
                    history_id: row.get(0)?,
                    played_at: row.get(1)?,
                    song: SongSummary {
                        song_id: row.get(2)?,
                        track_name: row.get(3)?,
                        duration: row.get(4)?,
                        popularity: row.get(5)?,
                        genre: row.get(6)?,
                        album_name: row.get(7)?,
                        artists: Vec::new(),
                    },
                })
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for entry in &mut entries {
            entry.song.artists = Self::song_artist_names(&conn, entry.song.song_id)?;
        }
        Ok(entries)
    }

    fn user_top_artists(&self, id: UserId, limit: usize) -> Result<Vec<ArtistPlayCount>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT ar.artist_id, ar.artist_name, COUNT(lh.history_id) AS play_count
             FROM listening_history lh
             JOIN song_artists sa ON sa.song_id = lh.song_id
             JOIN artists ar ON ar.artist_id = sa.artist_id
             WHERE lh.user_id = ?1
             GROUP BY ar.artist_id, ar.artist_name
             ORDER BY play_count DESC, ar.artist_id
             LIMIT ?2",
        )?;
        let top = stmt
            .query_map(params![id, limit as i64], |row| {
                Ok(ArtistPlayCount {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    play_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(top)
    }

    fn user_statistics(&self, id: UserId) -> Result<UserStatistics> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let total_listening_time_seconds: i64 = conn.query_row(
            "SELECT COALESCE(SUM(s.duration), 0)
             FROM listening_history lh
             JOIN songs s ON s.song_id = lh.song_id
             WHERE lh.user_id = ?1",
            params![id],
            |r| r.get(0),
        )?;

        let total_plays: i64 = conn.query_row(
            "SELECT COUNT(*) FROM listening_history WHERE user_id = ?1",
            params![id],
            |r| r.get(0),
        )?;

        let favorite_genre = match conn.query_row(
            "SELECT s.genre, COUNT(*) AS play_count
             FROM listening_history lh
             JOIN songs s ON s.song_id = lh.song_id
             WHERE lh.user_id = ?1 AND s.genre IS NOT NULL
             GROUP BY s.genre
             ORDER BY play_count DESC, s.genre
             LIMIT 1",
            params![id],
            |row| {
                Ok(GenrePlayCount {
                    genre: row.get(0)?,
                    play_count: row.get(1)?,
                })
            },
        ) {
            Ok(genre) => Some(genre),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let most_played = match conn.query_row(
            "SELECT s.song_id, s.track_name, COUNT(*) AS play_count
             FROM listening_history lh
             JOIN songs s ON s.song_id = lh.song_id
             WHERE lh.user_id = ?1
             GROUP BY s.song_id, s.track_name
             ORDER BY play_count DESC, s.song_id
             LIMIT 1",
            params![id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
        ) {
            Ok((song_id, track_name, play_count)) => Some(MostPlayedSong {
                song_id,
                track_name,
                play_count,
                artists: Self::song_artist_names(&conn, song_id)?,
            }),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(UserStatistics {
            total_listening_time_seconds,
            total_plays,
            favorite_genre,
            most_played_song: most_played,
        })
    }

    // =========================================================================
    // Songs
    // =========================================================================

    fn list_songs(&self) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "{} ORDER BY s.popularity DESC, s.song_id",
            SONG_SUMMARY_SELECT
        );
        Self::collect_song_summaries(&conn, &sql, [])
    }

    fn get_song(&self, id: SongId) -> Result<Option<SongDetail>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, s.spotify_track_id,
                    a.album_id, a.album_name, a.release_date
             FROM songs s
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE s.song_id = ?1",
        )?;

        type SongRow = (
            i64,
            String,
            Option<i64>,
            i64,
            Option<String>,
            Option<String>,
            Option<i64>,
            Option<String>,
            Option<String>,
        );
        let row: SongRow = match stmt.query_row(params![id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        }) {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        drop(stmt);

        let album = match (row.6, row.7) {
            (Some(album_id), Some(album_name)) => Some(AlbumRef {
                album_id,
                album_name,
                release_date: row.8,
            }),
            _ => None,
        };

        let mut artist_stmt = conn.prepare_cached(
            "SELECT ar.artist_id, ar.artist_name
             FROM song_artists sa
             JOIN artists ar ON ar.artist_id = sa.artist_id
             WHERE sa.song_id = ?1
             ORDER BY ar.artist_name",
        )?;
        let artists = artist_stmt
            .query_map(params![id], |r| {
                Ok(ArtistRef {
                    artist_id: r.get(0)?,
                    artist_name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(artist_stmt);

        let audio_features = Self::feature_row_inner(&conn, id)?;

        Ok(Some(SongDetail {
            song_id: row.0,
            track_name: row.1,
            duration: row.2,
            popularity: row.3,
            genre: row.4,
            spotify_track_id: row.5,
            album,
            artists,
            audio_features,
        }))
    }

    fn songs_by_genre(&self, genre: &str) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "{} WHERE s.genre = ?1 ORDER BY s.popularity DESC, s.song_id",
            SONG_SUMMARY_SELECT
        );
        Self::collect_song_summaries(&conn, &sql, params![genre])
    }

    fn filter_songs(&self, filter: &FeatureFilter) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut sql = format!(
            "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             FROM songs s
             JOIN audio_features af ON af.song_id = s.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE af.energy BETWEEN ? AND ?
               AND af.danceability BETWEEN ? AND ?
               AND af.tempo BETWEEN ? AND ?
               AND af.acousticness BETWEEN ? AND ?
               AND af.valence BETWEEN ? AND ?"
        );
        let mut query_params: Vec<Value> = vec![
            filter.energy_min.into(),
            filter.energy_max.into(),
            filter.danceability_min.into(),
            filter.danceability_max.into(),
            filter.tempo_min.into(),
            filter.tempo_max.into(),
            filter.acousticness_min.into(),
            filter.acousticness_max.into(),
            filter.valence_min.into(),
            filter.valence_max.into(),
        ];
        if let Some(genre) = &filter.genre {
            sql.push_str(" AND s.genre = ?");
            query_params.push(genre.clone().into());
        }
        sql.push_str(" ORDER BY s.popularity DESC, s.song_id");

        Self::collect_song_summaries(&conn, &sql, params_from_iter(query_params))
    }

    fn popular_songs(&self, limit: usize) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "{} ORDER BY s.popularity DESC, s.song_id LIMIT ?1",
            SONG_SUMMARY_SELECT
        );
        Self::collect_song_summaries(&conn, &sql, params![limit as i64])
    }

    fn trending_songs(&self, since_epoch: i64, limit: usize) -> Result<Vec<TrendingSong>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name,
                    COUNT(lh.history_id) AS recent_play_count
             FROM songs s
             JOIN listening_history lh ON lh.song_id = s.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE lh.played_at >= ?1
             GROUP BY s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             ORDER BY recent_play_count DESC, s.popularity DESC, s.song_id
             LIMIT ?2",
        )?;
        let mut trending: Vec<TrendingSong> = stmt
            .query_map(params![since_epoch, limit as i64], |row| {
                Ok(TrendingSong {
                    song: Self::parse_song_summary(row)?,
                    recent_play_count: row.get(6)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for entry in &mut trending {
            entry.song.artists = Self::song_artist_names(&conn, entry.song.song_id)?;
        }
        Ok(trending)
    }

    // =========================================================================
    // Artists
    // =========================================================================

    fn list_artists(&self, limit: i64, offset: i64) -> Result<ArtistPage> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let total_artists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (
                 SELECT sa.artist_id FROM song_artists sa
                 GROUP BY sa.artist_id
                 HAVING COUNT(sa.song_id) >= 2
             )",
            [],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare_cached(
            "SELECT ar.artist_id, ar.artist_name, COUNT(sa.song_id) AS song_count
             FROM artists ar
             JOIN song_artists sa ON sa.artist_id = ar.artist_id
             GROUP BY ar.artist_id, ar.artist_name
             HAVING COUNT(sa.song_id) >= 2
             ORDER BY ar.artist_id
             LIMIT ?1 OFFSET ?2",
        )?;
        let artists = stmt
            .query_map(params![limit, offset], |row| {
                Ok(ArtistSummary {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    song_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArtistPage {
            total_artists,
            limit,
            offset,
            returned: artists.len(),
            artists,
        })
    }

    fn get_artist(&self, id: ArtistId) -> Result<Option<ArtistDetail>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let base = match conn.query_row(
            "SELECT artist_id, artist_name, created_at FROM artists WHERE artist_id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        ) {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let song_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM song_artists WHERE artist_id = ?1",
            params![id],
            |r| r.get(0),
        )?;

        let album_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT s.album_id)
             FROM song_artists sa
             JOIN songs s ON s.song_id = sa.song_id
             WHERE sa.artist_id = ?1 AND s.album_id IS NOT NULL",
            params![id],
            |r| r.get(0),
        )?;

        let avg_popularity: Option<f64> = conn.query_row(
            "SELECT AVG(s.popularity)
             FROM song_artists sa
             JOIN songs s ON s.song_id = sa.song_id
             WHERE sa.artist_id = ?1",
            params![id],
            |r| r.get(0),
        )?;

        Ok(Some(ArtistDetail {
            artist_id: base.0,
            artist_name: base.1,
            created_at: base.2,
            song_count,
            album_count,
            avg_popularity,
        }))
    }

    fn artist_songs(&self, id: ArtistId) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             FROM songs s
             JOIN song_artists sa ON sa.song_id = s.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE sa.artist_id = ?1
             ORDER BY s.popularity DESC, s.song_id";
        Self::collect_song_summaries(&conn, sql, params![id])
    }

    fn top_artists(&self, limit: usize) -> Result<Vec<TopArtist>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT ar.artist_id, ar.artist_name,
                    COUNT(lh.history_id) AS play_count,
                    COUNT(DISTINCT lh.user_id) AS unique_listeners
             FROM artists ar
             JOIN song_artists sa ON sa.artist_id = ar.artist_id
             JOIN listening_history lh ON lh.song_id = sa.song_id
             GROUP BY ar.artist_id, ar.artist_name
             ORDER BY play_count DESC, ar.artist_id
             LIMIT ?1",
        )?;
        let top = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TopArtist {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    play_count: row.get(2)?,
                    unique_listeners: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(top)
    }

    // =========================================================================
    // Albums
    // =========================================================================

    fn list_albums(&self, limit: i64, offset: i64) -> Result<AlbumPage> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let total_albums: i64 =
            conn.query_row("SELECT COUNT(*) FROM albums", [], |r| r.get(0))?;

        let mut stmt = conn.prepare_cached(
            "SELECT al.album_id, al.album_name, al.release_date,
                    (SELECT COUNT(*) FROM songs s WHERE s.album_id = al.album_id) AS track_count
             FROM albums al
             ORDER BY al.release_date DESC, al.album_id
             LIMIT ?1 OFFSET ?2",
        )?;
        let mut albums: Vec<AlbumSummary> = stmt
            .query_map(params![limit, offset], |row| {
                Ok(AlbumSummary {
                    album_id: row.get(0)?,
                    album_name: row.get(1)?,
                    release_date: row.get(2)?,
                    track_count: row.get(3)?,
                    artists: Vec::new(),
                })
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        for album in &mut albums {
            album.artists = Self::album_artist_names(&conn, album.album_id)?;
        }

        Ok(AlbumPage {
            total_albums,
            limit,
            offset,
            returned: albums.len(),
            albums,
        })
    }

    fn get_album(&self, id: AlbumId) -> Result<Option<AlbumDetail>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let base = match conn.query_row(
            "SELECT al.album_id, al.album_name, al.release_date,
                    COUNT(DISTINCT s.song_id), SUM(s.duration), AVG(s.popularity)
             FROM albums al
             LEFT JOIN songs s ON s.album_id = al.album_id
             WHERE al.album_id = ?1
             GROUP BY al.album_id, al.album_name, al.release_date",
            params![id],
            |row| {
                Ok(AlbumDetail {
                    album_id: row.get(0)?,
                    album_name: row.get(1)?,
                    release_date: row.get(2)?,
                    track_count: row.get(3)?,
                    total_duration: row.get(4)?,
                    avg_popularity: row.get(5)?,
                    artists: Vec::new(),
                })
            },
        ) {
            Ok(detail) => detail,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut detail = base;
        detail.artists = Self::album_artist_names(&conn, id)?;
        Ok(Some(detail))
    }

    fn album_tracks(&self, id: AlbumId) -> Result<Vec<SongSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!("{} WHERE s.album_id = ?1 ORDER BY s.song_id", SONG_SUMMARY_SELECT);
        Self::collect_song_summaries(&conn, &sql, params![id])
    }

    // =========================================================================
    // Recommendation Support
    // =========================================================================

    fn listened_song_ids(&self, user_id: UserId) -> Result<HashSet<SongId>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT song_id FROM listening_history WHERE user_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![user_id], |r| r.get(0))?
            .collect::<Result<HashSet<SongId>, _>>()?;
        Ok(ids)
    }

    fn feature_row(&self, song_id: SongId) -> Result<Option<AudioFeatures>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        Self::feature_row_inner(&conn, song_id)
    }

    fn user_feature_rows(&self, user_id: UserId) -> Result<Vec<AudioFeatures>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        // One row per play, not per song: repeated listens weight the
        // aggregate toward the songs the user returns to.
        let sql = format!(
            "SELECT {} FROM listening_history lh
             JOIN audio_features af ON af.song_id = lh.song_id
             WHERE lh.user_id = ?1
             ORDER BY lh.history_id",
            FEATURE_COLUMNS
        );
        Self::feature_rows_for(&conn, &sql, params![user_id])
    }

    fn artist_feature_rows(&self, artist_id: ArtistId) -> Result<Vec<AudioFeatures>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM song_artists sa
             JOIN audio_features af ON af.song_id = sa.song_id
             WHERE sa.artist_id = ?1
             ORDER BY sa.song_id",
            FEATURE_COLUMNS
        );
        Self::feature_rows_for(&conn, &sql, params![artist_id])
    }

    fn album_feature_rows(&self, album_id: AlbumId) -> Result<Vec<AudioFeatures>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM songs s
             JOIN audio_features af ON af.song_id = s.song_id
             WHERE s.album_id = ?1
             ORDER BY s.song_id",
            FEATURE_COLUMNS
        );
        Self::feature_rows_for(&conn, &sql, params![album_id])
    }

    fn artist_ids_listened_by(&self, user_id: UserId) -> Result<Vec<ArtistId>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT sa.artist_id
             FROM listening_history lh
             JOIN song_artists sa ON sa.song_id = lh.song_id
             WHERE lh.user_id = ?1
             ORDER BY sa.artist_id",
        )?;
        let ids = stmt
            .query_map(params![user_id], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn album_ids_partially_explored(&self, user_id: UserId) -> Result<Vec<AlbumId>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.album_id
             FROM listening_history lh
             JOIN songs s ON s.song_id = lh.song_id
             WHERE lh.user_id = ?1 AND s.album_id IS NOT NULL
             GROUP BY s.album_id
             HAVING COUNT(DISTINCT lh.song_id) <
                    (SELECT COUNT(*) FROM songs s2 WHERE s2.album_id = s.album_id)
             ORDER BY s.album_id",
        )?;
        let ids = stmt
            .query_map(params![user_id], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn songs_by_artists(
        &self,
        artist_ids: &[ArtistId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>> {
        if artist_ids.is_empty() {
            return Ok(Vec::new());
        }
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut sql = format!(
            "SELECT DISTINCT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             FROM songs s
             JOIN song_artists sa ON sa.song_id = s.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id
             WHERE sa.artist_id IN ({})",
            placeholders(artist_ids.len())
        );
        let mut query_params: Vec<i64> = artist_ids.to_vec();
        if !excluding.is_empty() {
            sql.push_str(&format!(
                " AND s.song_id NOT IN ({})",
                placeholders(excluding.len())
            ));
            query_params.extend(excluding.iter().copied());
        }
        sql.push_str(" ORDER BY s.popularity DESC, s.song_id LIMIT ?");
        query_params.push(cap as i64);

        Self::collect_song_summaries(&conn, &sql, params_from_iter(query_params))
    }

    fn songs_by_albums(
        &self,
        album_ids: &[AlbumId],
        excluding: &HashSet<SongId>,
        cap: usize,
    ) -> Result<Vec<SongSummary>> {
        if album_ids.is_empty() {
            return Ok(Vec::new());
        }
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut sql = format!(
            "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name
             FROM songs s
             JOIN albums a ON a.album_id = s.album_id
             WHERE s.album_id IN ({})",
            placeholders(album_ids.len())
        );
        let mut query_params: Vec<i64> = album_ids.to_vec();
        if !excluding.is_empty() {
            sql.push_str(&format!(
                " AND s.song_id NOT IN ({})",
                placeholders(excluding.len())
            ));
            query_params.extend(excluding.iter().copied());
        }
        sql.push_str(" ORDER BY s.popularity DESC, s.song_id LIMIT ?");
        query_params.push(cap as i64);

        Self::collect_song_summaries(&conn, &sql, params_from_iter(query_params))
    }

    fn songs_with_features(
        &self,
        excluding: &HashSet<SongId>,
    ) -> Result<Vec<(SongSummary, AudioFeatures)>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let mut sql = format!(
            "SELECT s.song_id, s.track_name, s.duration, s.popularity, s.genre, a.album_name, {}
             FROM songs s
             JOIN audio_features af ON af.song_id = s.song_id
             LEFT JOIN albums a ON a.album_id = s.album_id",
            FEATURE_COLUMNS
        );
        let mut query_params: Vec<i64> = Vec::new();
        if !excluding.is_empty() {
            sql.push_str(&format!(
                " WHERE s.song_id NOT IN ({})",
                placeholders(excluding.len())
            ));
            query_params.extend(excluding.iter().copied());
        }
        sql.push_str(" ORDER BY s.song_id");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows: Vec<(SongSummary, AudioFeatures)> = stmt
            .query_map(params_from_iter(query_params), |row| {
                Ok((
                    Self::parse_song_summary(row)?,
                    Self::parse_features_at(row, 6)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        for (song, _) in &mut rows {
            song.artists = Self::song_artist_names(&conn, song.song_id)?;
        }
        Ok(rows)
    }

    fn all_artist_feature_rows(&self) -> Result<Vec<ArtistFeatureRow>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT ar.artist_id, ar.artist_name, {}
             FROM artists ar
             JOIN song_artists sa ON sa.artist_id = ar.artist_id
             JOIN audio_features af ON af.song_id = sa.song_id
             ORDER BY ar.artist_id, sa.song_id",
            FEATURE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ArtistFeatureRow {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    features: Self::parse_features_at(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn all_album_feature_rows(&self) -> Result<Vec<AlbumFeatureRow>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT al.album_id, al.album_name, al.release_date, {}
             FROM albums al
             JOIN songs s ON s.album_id = al.album_id
             JOIN audio_features af ON af.song_id = s.song_id
             ORDER BY al.album_id, s.song_id",
            FEATURE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AlbumFeatureRow {
                    album_id: row.get(0)?,
                    album_name: row.get(1)?,
                    release_date: row.get(2)?,
                    features: Self::parse_features_at(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
