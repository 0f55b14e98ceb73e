//! Shared constants for end-to-end tests
//!
//! All fixture ids live here so tests and fixtures stay in sync.
#![allow(dead_code)] // Not every test binary uses every constant

// ============================================================================
// Users
// ============================================================================

/// User with listening history (Riptide twice, Salt Air once)
pub const USER_LISTENER_ID: i64 = 1;

/// User with no listening history (cold start)
pub const USER_NEWCOMER_ID: i64 = 2;

// ============================================================================
// Artists
// ============================================================================

/// "Glass Harbor" - indie band with 4 songs
pub const ARTIST_GLASS_HARBOR_ID: i64 = 1;

/// "Midnight Circuit" - synthwave act with 3 songs
pub const ARTIST_MIDNIGHT_CIRCUIT_ID: i64 = 2;

/// "Quiet Pines" - ambient artist with two songs
pub const ARTIST_QUIET_PINES_ID: i64 = 3;

// ============================================================================
// Albums
// ============================================================================

/// "Undertow" by Glass Harbor (songs 1-4)
pub const ALBUM_UNDERTOW_ID: i64 = 1;

/// "Neon Maps" by Midnight Circuit (songs 5-7)
pub const ALBUM_NEON_MAPS_ID: i64 = 2;

// ============================================================================
// Songs
// ============================================================================

pub const SONG_RIPTIDE_ID: i64 = 1;
pub const SONG_SALT_AIR_ID: i64 = 2;
pub const SONG_HARBOR_LIGHTS_ID: i64 = 3;
pub const SONG_BREAKWATER_ID: i64 = 4;
pub const SONG_GRIDLINE_ID: i64 = 5;
pub const SONG_AFTERIMAGE_ID: i64 = 6;
pub const SONG_VECTOR_CITY_ID: i64 = 7;
pub const SONG_CLEARING_ID: i64 = 8;

/// "Driftwood" has no audio-feature row
pub const SONG_DRIFTWOOD_ID: i64 = 9;

// ============================================================================
// Timings
// ============================================================================

/// Timeout for the test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for readiness
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 25;

/// Per-request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
