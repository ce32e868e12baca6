//! SQLite storage implementation.
//!
//! This module provides the versioned record store. It follows the
//! MutationContext pattern: every local write runs inside an IMMEDIATE
//! transaction that stamps each changed cell in the clock under the local
//! site id and one fresh transaction sequence number.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::Bookmark;
use crate::storage::clock;
use crate::storage::schema::apply_schema;
use crate::sync::hash::site_bits;
use crate::sync::{ApplyStats, ChangeRecord, Column, SiteVersionVector};

const META_EXPORTED_SEQ: &str = "exported_seq";
const META_LAST_EXPORT_AT: &str = "last_export_at";

/// SQLite-based versioned record store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    site_id: String,
}

/// Context for a local mutation, collecting the changes it produces.
///
/// All changes recorded through one context share the same `seq`.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    site_id: String,
    seq: i64,
    /// Changes stamped so far, in stamping order.
    pub changes: Vec<ChangeRecord>,
}

impl MutationContext {
    fn new(op_name: &str, site_id: &str, seq: i64) -> Self {
        Self {
            op_name: op_name.to_string(),
            site_id: site_id.to_string(),
            seq,
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Stamp one cell: bump its version, write it to the clock, record it.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock cannot be read or written.
    pub fn stamp(
        &mut self,
        conn: &Connection,
        row_id: i64,
        column: Column,
        value: Option<String>,
        causal_length: i64,
    ) -> Result<()> {
        let version = match clock::get_entry(conn, row_id, column)? {
            Some(entry) => entry
                .version
                .checked_add(1)
                .ok_or_else(|| overflow(row_id, column))?,
            None => 1,
        };
        let change = ChangeRecord {
            row_id,
            column,
            value,
            version,
            site_id: self.site_id.clone(),
            causal_length,
            seq: self.seq,
        };
        clock::put_entry(conn, &change)?;
        trace!(op = %self.op_name, row_id, %column, version, "Stamped cell");
        self.changes.push(change);
        Ok(())
    }
}

/// A bookmark row as stored, data columns in `Column::DATA` order.
struct StoredRow {
    id: i64,
    values: [String; 4],
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            values: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
        })
    }

    fn bookmark(&self) -> Bookmark {
        let mut bookmark = Bookmark::default();
        for (column, value) in Column::DATA.iter().zip(&self.values) {
            bookmark.set_column(*column, value);
        }
        bookmark
    }
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_ROW: &str = "SELECT id, url, title, description, tags FROM bookmarks";

impl SqliteStorage {
    /// Open a database at the given path for replica `site_id`.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path, site_id: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            site_id: site_id.to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory(site_id: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            site_id: site_id.to_string(),
        })
    }

    /// This replica's site id.
    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Close the connection, reporting any error from SQLite.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite refuses to close (the handle is still
    /// released when dropped).
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    /// Execute a local mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Allocates the next local sequence number
    /// 3. Executes the mutation closure, which stamps cells via the context
    /// 4. Advances the local vector entry if anything was stamped
    /// 5. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let seq = clock::site_seq(&tx, &self.site_id)?
            .checked_add(1)
            .ok_or_else(|| Error::ClockOverflow {
                row_id: 0,
                column: "seq".to_string(),
            })?;
        let mut ctx = MutationContext::new(op, &self.site_id, seq);

        let result = f(&tx, &mut ctx)?;

        if !ctx.changes.is_empty() {
            clock::advance_site(&tx, &self.site_id, seq)?;
            debug!(op, seq, changes = ctx.changes.len(), "Recorded local changes");
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Bookmark Operations
    // ==================

    /// Insert a bookmark, returning its new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_bookmark(&mut self, bookmark: &Bookmark) -> Result<i64> {
        self.mutate("insert_bookmark", |tx, ctx| {
            let id = next_row_id(tx, ctx.site_id())?;

            tx.execute(
                "INSERT INTO bookmarks (id, url, title, description, tags) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    bookmark.url,
                    bookmark.title,
                    bookmark.description,
                    bookmark.joined_tags()
                ],
            )?;

            ctx.stamp(tx, id, Column::Sentinel, None, 1)?;
            for column in Column::DATA {
                ctx.stamp(tx, id, column, bookmark.column_value(column), 1)?;
            }

            Ok(id)
        })
    }

    /// Replace the fields of every bookmark whose current URL is `match_url`.
    ///
    /// Only columns whose value actually changes are stamped, so rewriting a
    /// bookmark with identical fields produces no change records. Returns
    /// the number of rows matched.
    ///
    /// # Errors
    ///
    /// Returns `Error::BookmarkNotFound` if no row matches.
    pub fn update_bookmark(&mut self, match_url: &str, updated: &Bookmark) -> Result<usize> {
        self.mutate("update_bookmark", |tx, ctx| {
            let targets = rows_by_url(tx, match_url)?;
            if targets.is_empty() {
                return Err(Error::BookmarkNotFound {
                    url: match_url.to_string(),
                });
            }

            let new_values = Column::DATA.map(|c| updated.column_value(c).unwrap_or_default());

            for row in &targets {
                let changed: Vec<usize> = (0..Column::DATA.len())
                    .filter(|&i| row.values[i] != new_values[i])
                    .collect();
                if changed.is_empty() {
                    continue;
                }

                tx.execute(
                    "UPDATE bookmarks SET url = ?1, title = ?2, description = ?3, tags = ?4 WHERE id = ?5",
                    rusqlite::params![
                        new_values[0],
                        new_values[1],
                        new_values[2],
                        new_values[3],
                        row.id
                    ],
                )?;

                let causal_length = clock::row_causal_length(tx, row.id)?.unwrap_or(1);
                for i in changed {
                    ctx.stamp(
                        tx,
                        row.id,
                        Column::DATA[i],
                        Some(new_values[i].clone()),
                        causal_length,
                    )?;
                }
            }

            Ok(targets.len())
        })
    }

    /// Delete every bookmark whose URL is `url`, leaving a tombstone.
    ///
    /// # Errors
    ///
    /// Returns `Error::BookmarkNotFound` if no row matches.
    pub fn delete_bookmark(&mut self, url: &str) -> Result<usize> {
        self.mutate("delete_bookmark", |tx, ctx| {
            let targets = rows_by_url(tx, url)?;
            if targets.is_empty() {
                return Err(Error::BookmarkNotFound {
                    url: url.to_string(),
                });
            }

            for row in &targets {
                let causal_length = clock::row_causal_length(tx, row.id)?.unwrap_or(1);
                let tombstone = causal_length
                    .checked_add(1)
                    .ok_or_else(|| overflow(row.id, Column::Sentinel))?;
                ctx.stamp(tx, row.id, Column::Sentinel, None, tombstone)?;
                tx.execute("DELETE FROM bookmarks WHERE id = ?1", [row.id])?;
            }

            Ok(targets.len())
        })
    }

    /// Get the first bookmark (lowest id) with the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_bookmark_by_url(&self, url: &str) -> Result<Option<Bookmark>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_ROW} WHERE url = ?1 ORDER BY id LIMIT 1"),
                [url],
                StoredRow::from_row,
            )
            .optional()?;
        Ok(row.map(|r| r.bookmark()))
    }

    /// Get a bookmark by row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        let row = self
            .conn
            .query_row(&format!("{SELECT_ROW} WHERE id = ?1"), [id], StoredRow::from_row)
            .optional()?;
        Ok(row.map(|r| r.bookmark()))
    }

    /// All live bookmarks with their row ids, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_bookmarks(&self) -> Result<Vec<(i64, Bookmark)>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_ROW} ORDER BY id"))?;
        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().map(|r| (r.id, r.bookmark())).collect())
    }

    /// Number of live bookmarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_bookmarks(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))?)
    }

    /// Full-text search, best matches first.
    ///
    /// Each whitespace-separated term is matched literally; all terms must
    /// match.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an empty query.
    pub fn search_bookmarks(&self, query: &str) -> Result<Vec<Bookmark>> {
        let match_expr = fts_match_expression(query)
            .ok_or_else(|| Error::InvalidArgument("search query must not be empty".to_string()))?;

        let mut stmt = self.conn.prepare(
            "SELECT rowid, url, title, description, tags FROM bookmarks_fts
             WHERE bookmarks_fts MATCH ?1
             ORDER BY rank, rowid",
        )?;
        let rows = stmt
            .query_map([match_expr], StoredRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.iter().map(StoredRow::bookmark).collect())
    }

    // ==================
    // Versioning
    // ==================

    /// Every clock entry whose `(site_id, seq)` the vector has not seen,
    /// ordered by row, column, version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn export_changes_since(&self, vector: &SiteVersionVector) -> Result<Vec<ChangeRecord>> {
        Ok(clock::all_entries(&self.conn)?
            .into_iter()
            .filter(|c| !vector.dominates(&c.site_id, c.seq))
            .collect())
    }

    /// Apply incoming changes with last-writer-wins per cell.
    ///
    /// The vector is raised to the `(site_id, seq)` of every change given.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is applied then.
    pub fn apply_changes(&mut self, changes: &[ChangeRecord]) -> Result<ApplyStats> {
        let observed: SiteVersionVector = changes
            .iter()
            .map(|c| (c.site_id.clone(), c.seq))
            .collect();
        self.apply_changes_observing(changes, &observed)
    }

    /// Apply incoming changes and raise the vector to `observed`, atomically.
    ///
    /// A change is written only if its `(causal_length, version, site_id)`
    /// is strictly greater than the stored entry for its cell; every row that
    /// received a winning change is re-derived from the clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is applied then.
    pub fn apply_changes_observing(
        &mut self,
        changes: &[ChangeRecord],
        observed: &SiteVersionVector,
    ) -> Result<ApplyStats> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut stats = ApplyStats::default();
        let mut touched = BTreeSet::new();

        for change in changes {
            let current = clock::get_entry(&tx, change.row_id, change.column)?;
            let wins = current
                .as_ref()
                .is_none_or(|entry| change.wins_over(entry.key()));
            if wins {
                clock::put_entry(&tx, change)?;
                touched.insert(change.row_id);
                stats.applied += 1;
                trace!(
                    row_id = change.row_id,
                    column = %change.column,
                    site = %change.site_id,
                    "Change applied"
                );
            } else {
                stats.ignored += 1;
            }
        }

        for &row_id in &touched {
            materialize_row(&tx, row_id)?;
        }
        stats.rows_touched = touched.len();

        clock::save_vector(&tx, observed)?;
        tx.commit()?;

        debug!(
            applied = stats.applied,
            ignored = stats.ignored,
            rows = stats.rows_touched,
            "Applied changes"
        );
        Ok(stats)
    }

    /// The persisted site version vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn site_vector(&self) -> Result<SiteVersionVector> {
        Ok(clock::load_vector(&self.conn)?)
    }

    /// This replica's transaction sequence high-water mark.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn local_seq(&self) -> Result<i64> {
        Ok(clock::site_seq(&self.conn, &self.site_id)?)
    }

    /// Whether the store has any versioned history.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_history(&self) -> Result<bool> {
        Ok(!clock::is_empty(&self.conn)?)
    }

    /// Record a successful export covering local sequence `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_export(&mut self, seq: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        clock::set_meta(&tx, META_EXPORTED_SEQ, &seq.to_string())?;
        clock::set_meta(&tx, META_LAST_EXPORT_AT, &now.to_string())?;
        tx.commit()?;
        Ok(())
    }

    /// Local sequence covered by the last export, 0 if never exported.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn exported_seq(&self) -> Result<i64> {
        Ok(clock::get_meta(&self.conn, META_EXPORTED_SEQ)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Unix millis of the last export.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_export_at(&self) -> Result<Option<i64>> {
        Ok(clock::get_meta(&self.conn, META_LAST_EXPORT_AT)?.and_then(|v| v.parse().ok()))
    }

    /// Local clock entries written after the last export.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn pending_local_changes(&self) -> Result<usize> {
        let exported = self.exported_seq()?;
        Ok(clock::count_site_entries_after(
            &self.conn,
            &self.site_id,
            exported,
        )?)
    }

    // ==================
    // Access Keys (local only)
    // ==================

    /// Store a new access key.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateKey` if the key exists, `InvalidArgument` if empty.
    pub fn add_key(&mut self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::InvalidArgument("key must not be empty".to_string()));
        }
        match self
            .conn
            .execute("INSERT INTO server_keys (key) VALUES (?1)", [key])
        {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `key` is a stored access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self
            .conn
            .prepare("SELECT 1 FROM server_keys WHERE key = ?1")?
            .exists([key])?)
    }

    /// All access keys, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM server_keys ORDER BY id")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// Delete an access key. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_key(&mut self, key: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM server_keys WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }
}

/// Rows whose current URL equals `url`, ordered by id.
fn rows_by_url(conn: &Connection, url: &str) -> Result<Vec<StoredRow>> {
    let mut stmt = conn.prepare(&format!("{SELECT_ROW} WHERE url = ?1 ORDER BY id"))?;
    let rows = stmt
        .query_map([url], StoredRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Allocate a row id for a local insert.
///
/// Ids are `(millis << 16) | site_bits`, bumped above every id already known
/// so they keep increasing even if the wall clock steps back.
fn next_row_id(conn: &Connection, site_id: &str) -> Result<i64> {
    let bits = site_bits(site_id);
    let candidate = (chrono::Utc::now().timestamp_millis() << 16) | bits;
    let max_known = clock::max_row_id(conn)?;
    if candidate > max_known {
        return Ok(candidate);
    }
    (max_known >> 16)
        .checked_add(1)
        .and_then(|high| high.checked_mul(1 << 16))
        .map(|base| base | bits)
        .ok_or_else(|| overflow(max_known, Column::Sentinel))
}

fn overflow(row_id: i64, column: Column) -> Error {
    Error::ClockOverflow {
        row_id,
        column: column.to_string(),
    }
}

/// Re-derive a bookmark row from the clock.
///
/// Even causal length removes the row; odd causal length upserts it from the
/// cells of the current incarnation. Unchanged rows are left untouched so the
/// index triggers do not fire.
fn materialize_row(conn: &Connection, row_id: i64) -> Result<()> {
    let Some(causal_length) = clock::row_causal_length(conn, row_id)? else {
        return Ok(());
    };

    if causal_length % 2 == 0 {
        conn.execute("DELETE FROM bookmarks WHERE id = ?1", [row_id])?;
        return Ok(());
    }

    let mut values: [String; 4] = Default::default();
    for (column, value) in clock::row_cells(conn, row_id, causal_length)? {
        if let Some(i) = Column::DATA.iter().position(|c| *c == column) {
            values[i] = value;
        }
    }

    conn.execute(
        "INSERT INTO bookmarks (id, url, title, description, tags) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            url = excluded.url,
            title = excluded.title,
            description = excluded.description,
            tags = excluded.tags
         WHERE url IS NOT excluded.url
            OR title IS NOT excluded.title
            OR description IS NOT excluded.description
            OR tags IS NOT excluded.tags",
        rusqlite::params![row_id, values[0], values[1], values[2], values[3]],
    )?;
    Ok(())
}

/// Quote each term for FTS5 so user input is never parsed as query syntax.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(site: &str) -> SqliteStorage {
        SqliteStorage::open_memory(site).unwrap()
    }

    fn sample() -> Bookmark {
        Bookmark::new("https://x.com")
            .with_title("X")
            .with_tags(["a", "b"])
    }

    fn remote(row_id: i64, column: Column, value: &str, version: i64, site: &str) -> ChangeRecord {
        ChangeRecord {
            row_id,
            column,
            value: Some(value.to_string()),
            version,
            site_id: site.to_string(),
            causal_length: 1,
            seq: version,
        }
    }

    #[test]
    fn test_insert_and_search() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();
        assert!(id > 0);

        let found = storage.search_bookmarks("X").unwrap();
        assert_eq!(found, vec![sample()]);
        assert_eq!(storage.get_bookmark(id).unwrap(), Some(sample()));
        assert_eq!(storage.get_bookmark_by_url("https://x.com").unwrap(), Some(sample()));
    }

    #[test]
    fn test_insert_stamps_every_column_once() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();

        let changes = storage.export_changes_since(&SiteVersionVector::new()).unwrap();
        assert_eq!(changes.len(), 5);
        assert!(changes.iter().all(|c| c.row_id == id
            && c.version == 1
            && c.site_id == "h1"
            && c.causal_length == 1
            && c.seq == 1));
        assert_eq!(storage.local_seq().unwrap(), 1);
    }

    #[test]
    fn test_row_ids_increase() {
        let mut storage = storage("h1");
        let first = storage.insert_bookmark(&sample()).unwrap();
        let second = storage.insert_bookmark(&Bookmark::new("https://y.com")).unwrap();
        assert!(second > first);
        assert_eq!(first & 0xFFFF, site_bits("h1"));
        assert_eq!(second & 0xFFFF, site_bits("h1"));
    }

    #[test]
    fn test_search_handles_url_punctuation() {
        let mut storage = storage("h1");
        storage.insert_bookmark(&sample()).unwrap();
        let found = storage.search_bookmarks("https://x.com").unwrap();
        assert_eq!(found.len(), 1);
        assert!(storage.search_bookmarks("nothing-here").unwrap().is_empty());
    }

    #[test]
    fn test_empty_query_rejected() {
        let storage = storage("h1");
        let err = storage.search_bookmarks("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_update_bumps_only_changed_columns() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();

        let edited = sample().with_title("Renamed");
        assert_eq!(storage.update_bookmark("https://x.com", &edited).unwrap(), 1);

        let seen: SiteVersionVector = [("h1".to_string(), 1)].into_iter().collect();
        let changes = storage.export_changes_since(&seen).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].row_id, id);
        assert_eq!(changes[0].column, Column::Title);
        assert_eq!(changes[0].version, 2);
        assert_eq!(changes[0].seq, 2);

        assert_eq!(storage.search_bookmarks("Renamed").unwrap(), vec![edited]);
    }

    #[test]
    fn test_identical_update_produces_no_changes() {
        let mut storage = storage("h1");
        storage.insert_bookmark(&sample()).unwrap();
        let before = storage.export_changes_since(&SiteVersionVector::new()).unwrap();

        storage.update_bookmark("https://x.com", &sample()).unwrap();

        let after = storage.export_changes_since(&SiteVersionVector::new()).unwrap();
        assert_eq!(before, after);
        assert_eq!(storage.local_seq().unwrap(), 1);
    }

    #[test]
    fn test_update_can_change_url() {
        let mut storage = storage("h1");
        storage.insert_bookmark(&sample()).unwrap();
        let moved = Bookmark {
            url: "https://x.org".into(),
            ..sample()
        };
        storage.update_bookmark("https://x.com", &moved).unwrap();

        assert!(storage.get_bookmark_by_url("https://x.com").unwrap().is_none());
        assert_eq!(storage.get_bookmark_by_url("https://x.org").unwrap(), Some(moved));
    }

    #[test]
    fn test_update_missing_url_is_not_found() {
        let mut storage = storage("h1");
        let err = storage
            .update_bookmark("https://missing.example", &sample())
            .unwrap_err();
        assert!(matches!(err, Error::BookmarkNotFound { .. }));
        assert_eq!(storage.local_seq().unwrap(), 0);
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();
        storage.delete_bookmark("https://x.com").unwrap();

        assert!(storage.search_bookmarks("X").unwrap().is_empty());
        assert_eq!(storage.count_bookmarks().unwrap(), 0);

        let sentinel = storage
            .export_changes_since(&SiteVersionVector::new())
            .unwrap()
            .into_iter()
            .find(|c| c.row_id == id && c.column == Column::Sentinel)
            .unwrap();
        assert_eq!(sentinel.causal_length, 2);
    }

    #[test]
    fn test_export_is_ordered_by_row_column_version() {
        let mut storage = storage("h1");
        storage.insert_bookmark(&sample()).unwrap();
        storage.insert_bookmark(&Bookmark::new("https://y.com")).unwrap();

        let changes = storage.export_changes_since(&SiteVersionVector::new()).unwrap();
        let keys: Vec<(i64, &str)> = changes
            .iter()
            .map(|c| (c.row_id, c.column.as_str()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_apply_equal_versions_larger_site_wins() {
        let a = remote(7, Column::Title, "from a", 3, "host-a");
        let b = remote(7, Column::Title, "from b", 3, "host-b");

        let mut first = storage("local-1");
        first.apply_changes(&[a.clone()]).unwrap();
        first.apply_changes(&[b.clone()]).unwrap();

        let mut second = storage("local-2");
        second.apply_changes(&[b]).unwrap();
        second.apply_changes(&[a]).unwrap();

        assert_eq!(first.get_bookmark(7).unwrap().unwrap().title, "from b");
        assert_eq!(second.get_bookmark(7).unwrap().unwrap().title, "from b");
    }

    #[test]
    fn test_apply_higher_version_wins() {
        let mut storage = storage("local");
        storage
            .apply_changes(&[
                remote(7, Column::Title, "old", 2, "host-z"),
                remote(7, Column::Title, "new", 3, "host-a"),
            ])
            .unwrap();
        assert_eq!(storage.get_bookmark(7).unwrap().unwrap().title, "new");
    }

    #[test]
    fn test_apply_twice_is_noop() {
        let changes = vec![
            remote(7, Column::Url, "https://x.com", 1, "h2"),
            remote(7, Column::Title, "X", 1, "h2"),
        ];
        let mut storage = storage("h1");
        let first = storage.apply_changes(&changes).unwrap();
        assert_eq!(first.applied, 2);

        let second = storage.apply_changes(&changes).unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.ignored, 2);
        assert_eq!(storage.count_bookmarks().unwrap(), 1);
        assert_eq!(storage.site_vector().unwrap().get("h2"), 1);
    }

    #[test]
    fn test_local_write_after_merge_outranks_peer() {
        let mut storage = storage("h1");
        storage
            .apply_changes(&[
                remote(7, Column::Url, "https://x.com", 1, "h2"),
                remote(7, Column::Title, "peer title", 5, "h2"),
            ])
            .unwrap();

        let edited = Bookmark::new("https://x.com").with_title("local title");
        storage.update_bookmark("https://x.com", &edited).unwrap();

        let title = storage
            .export_changes_since(&SiteVersionVector::new())
            .unwrap()
            .into_iter()
            .find(|c| c.column == Column::Title)
            .unwrap();
        assert_eq!(title.version, 6);
        assert_eq!(title.site_id, "h1");
    }

    #[test]
    fn test_remote_tombstone_removes_row() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();

        let tombstone = ChangeRecord {
            row_id: id,
            column: Column::Sentinel,
            value: None,
            version: 2,
            site_id: "h2".into(),
            causal_length: 2,
            seq: 1,
        };
        storage.apply_changes(&[tombstone]).unwrap();
        assert!(storage.get_bookmark(id).unwrap().is_none());
        assert!(storage.search_bookmarks("X").unwrap().is_empty());

        // A concurrent edit of the deleted incarnation does not bring it back
        let late_edit = ChangeRecord {
            causal_length: 1,
            ..remote(id, Column::Title, "late", 9, "h3")
        };
        storage.apply_changes(&[late_edit]).unwrap();
        assert!(storage.get_bookmark(id).unwrap().is_none());
    }

    #[test]
    fn test_exhausted_version_is_an_error() {
        let mut storage = storage("h1");
        let id = storage.insert_bookmark(&sample()).unwrap();
        storage
            .apply_changes(&[remote(id, Column::Title, "pinned", i64::MAX, "h2")])
            .unwrap();

        let edited = Bookmark {
            title: "mine".into(),
            ..sample()
        };
        let err = storage.update_bookmark(&sample().url, &edited).unwrap_err();
        assert!(matches!(err, Error::ClockOverflow { row_id, .. } if row_id == id));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(storage.get_bookmark(id).unwrap().unwrap().title, "pinned");
    }

    #[test]
    fn test_keys_crud() {
        let mut storage = storage("h1");
        storage.add_key("k1").unwrap();
        storage.add_key("k2").unwrap();
        assert!(matches!(storage.add_key("k1"), Err(Error::DuplicateKey)));
        assert!(matches!(storage.add_key(""), Err(Error::InvalidArgument(_))));

        assert!(storage.has_key("k1").unwrap());
        assert!(!storage.has_key("nope").unwrap());
        assert_eq!(storage.list_keys().unwrap(), vec!["k1", "k2"]);

        assert!(storage.delete_key("k1").unwrap());
        assert!(!storage.delete_key("k1").unwrap());
        assert_eq!(storage.list_keys().unwrap(), vec!["k2"]);
    }

    #[test]
    fn test_keys_are_not_versioned() {
        let mut storage = storage("h1");
        storage.add_key("k1").unwrap();
        assert!(storage
            .export_changes_since(&SiteVersionVector::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_export_bookkeeping() {
        let mut storage = storage("h1");
        storage.insert_bookmark(&sample()).unwrap();
        assert_eq!(storage.pending_local_changes().unwrap(), 5);
        assert_eq!(storage.last_export_at().unwrap(), None);

        storage.record_export(1).unwrap();
        assert_eq!(storage.exported_seq().unwrap(), 1);
        assert_eq!(storage.pending_local_changes().unwrap(), 0);
        assert!(storage.last_export_at().unwrap().is_some());
    }

    #[test]
    fn test_fts_match_expression_quotes_terms() {
        assert_eq!(fts_match_expression(""), None);
        assert_eq!(fts_match_expression("a b").as_deref(), Some("\"a\" \"b\""));
        assert_eq!(
            fts_match_expression("say \"hi\"").as_deref(),
            Some("\"say\" \"\"\"hi\"\"\"")
        );
    }
}
