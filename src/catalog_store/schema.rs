//! SQLite schema for the music catalog database.
//!
//! One database holds the whole catalog: users, artists, albums, songs, the
//! song/artist join table, per-song audio features and the append-only
//! listening history.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Core Tables
// =============================================================================

const USERS_TABLE: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("user_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("email", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["username"]],
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("artist_name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_artists_name", "artist_name")],
    unique_constraints: &[],
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("album_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("album_name", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text), // '2019-07-26', '2019-07', '2019'
    ],
    indices: &[("idx_albums_release_date", "release_date")],
    unique_constraints: &[],
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "album_id",
};

const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("song_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("track_name", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Integer, foreign_key = Some(&ALBUM_FK)),
        sqlite_column!("duration", &SqlType::Integer), // seconds
        sqlite_column!(
            "popularity",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("spotify_track_id", &SqlType::Text),
    ],
    indices: &[
        ("idx_songs_album", "album_id"),
        ("idx_songs_genre", "genre"),
        ("idx_songs_popularity", "popularity"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Junction / Satellite Tables
// =============================================================================

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "song_id",
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "artist_id",
};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "user_id",
};

/// Song <-> Artist relationship
const SONG_ARTISTS_TABLE: Table = Table {
    name: "song_artists",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
    ],
    indices: &[
        ("idx_song_artists_song", "song_id"),
        ("idx_song_artists_artist", "artist_id"),
    ],
    unique_constraints: &[&["song_id", "artist_id"]],
};

/// Per-song audio characteristics, at most one row per song
const AUDIO_FEATURES_TABLE: Table = Table {
    name: "audio_features",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("energy", &SqlType::Real, non_null = true),
        sqlite_column!("danceability", &SqlType::Real, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("tempo", &SqlType::Real, non_null = true),
        sqlite_column!("speechiness", &SqlType::Real, non_null = true),
        sqlite_column!("acousticness", &SqlType::Real, non_null = true),
        sqlite_column!("instrumentalness", &SqlType::Real, non_null = true),
        sqlite_column!("liveness", &SqlType::Real, non_null = true),
    ],
    indices: &[("idx_audio_features_song", "song_id")],
    unique_constraints: &[&["song_id"]],
};

/// Append-only listening events
const LISTENING_HISTORY_TABLE: Table = Table {
    name: "listening_history",
    columns: &[
        sqlite_column!("history_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("played_at", &SqlType::Integer, non_null = true), // unix seconds
    ],
    indices: &[
        ("idx_listening_history_user", "user_id"),
        ("idx_listening_history_song", "song_id"),
        ("idx_listening_history_played_at", "played_at"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USERS_TABLE,
        ARTISTS_TABLE,
        ALBUMS_TABLE,
        SONGS_TABLE,
        SONG_ARTISTS_TABLE,
        AUDIO_FEATURES_TABLE,
        LISTENING_HISTORY_TABLE,
    ],
    migration: None,
}];
