//! Database schema definitions.
//!
//! The bookmark table is the materialized view of the clock: every local
//! write and every merged change lands in `bookmark_clock` first and is then
//! reflected into `bookmarks`. The full-text index is kept in step with
//! `bookmarks` by triggers, never lazily.

use rusqlite::{Connection, Result};
use tracing::warn;

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the mark database.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Records
-- ====================

-- Bookmarks: one row per live record, tags joined with ', '
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_url ON bookmarks(url);

-- Full-text index, one entry per bookmark (rowid = bookmarks.id)
CREATE VIRTUAL TABLE IF NOT EXISTS bookmarks_fts USING fts5(
    url,
    title,
    description,
    tags
);

CREATE TRIGGER IF NOT EXISTS bookmarks_fts_insert AFTER INSERT ON bookmarks
BEGIN
    INSERT INTO bookmarks_fts (rowid, url, title, description, tags)
    VALUES (new.id, new.url, new.title, new.description, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_fts_delete AFTER DELETE ON bookmarks
BEGIN
    DELETE FROM bookmarks_fts WHERE rowid = old.id;
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_fts_update AFTER UPDATE ON bookmarks
BEGIN
    DELETE FROM bookmarks_fts WHERE rowid = old.id;
    INSERT INTO bookmarks_fts (rowid, url, title, description, tags)
    VALUES (new.id, new.url, new.title, new.description, new.tags);
END;

-- ====================
-- Versioning
-- ====================

-- Clock: the winning change per (row, column), sentinel included
CREATE TABLE IF NOT EXISTS bookmark_clock (
    row_id INTEGER NOT NULL,
    col TEXT NOT NULL,
    value TEXT,
    version INTEGER NOT NULL,
    site_id TEXT NOT NULL,
    causal_length INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    PRIMARY KEY (row_id, col)
);

CREATE INDEX IF NOT EXISTS idx_bookmark_clock_site ON bookmark_clock(site_id, seq);

-- Site version vector: highest transaction sequence seen per replica
CREATE TABLE IF NOT EXISTS site_versions (
    site_id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL
);

-- Sync bookkeeping (last export, etc.)
CREATE TABLE IF NOT EXISTS sync_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- ====================
-- Local-only tables
-- ====================

-- Access keys for the HTTP gate; never synchronized
CREATE TABLE IF NOT EXISTS server_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE
);
";

/// Apply the schema to a connection.
///
/// Schema statements are idempotent. If applying them fails but the core
/// tables are already present (an older database opened read-mostly, a
/// locked index rebuild), the failure is logged and the database is used
/// as-is.
///
/// # Errors
///
/// Returns an error if pragmas fail, or if the schema fails and the core
/// tables do not exist.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    if let Err(e) = conn.execute_batch(SCHEMA_SQL) {
        if !core_tables_exist(conn)? {
            return Err(e);
        }
        warn!(error = %e, "Schema update failed, continuing with existing tables");
        return Ok(());
    }

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Check that every table the store reads from is present.
pub fn core_tables_exist(conn: &Connection) -> Result<bool> {
    const CORE: [&str; 5] = [
        "bookmarks",
        "bookmarks_fts",
        "bookmark_clock",
        "site_versions",
        "server_keys",
    ];
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE name = ?1")?;
    for table in CORE {
        if !stmt.exists([table])? {
            return Ok(false);
        }
    }
    Ok(true)
}
