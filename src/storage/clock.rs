//! Clock table access.
//!
//! `bookmark_clock` keeps the winning change for every (row, column) cell,
//! and `site_versions` keeps the highest transaction sequence seen from each
//! replica. Both are written inside the caller's transaction.

use rusqlite::{Connection, OptionalExtension, Result};

use crate::sync::{ChangeRecord, Column, SiteVersionVector};

/// Stored ordering key of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEntry {
    pub version: i64,
    pub site_id: String,
    pub causal_length: i64,
}

impl ClockEntry {
    #[must_use]
    pub fn key(&self) -> (i64, i64, &str) {
        (self.causal_length, self.version, self.site_id.as_str())
    }
}

/// Look up the clock entry of one cell.
pub fn get_entry(conn: &Connection, row_id: i64, column: Column) -> Result<Option<ClockEntry>> {
    conn.query_row(
        "SELECT version, site_id, causal_length FROM bookmark_clock WHERE row_id = ?1 AND col = ?2",
        rusqlite::params![row_id, column],
        |row| {
            Ok(ClockEntry {
                version: row.get(0)?,
                site_id: row.get(1)?,
                causal_length: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Write a change as the cell's current clock entry.
pub fn put_entry(conn: &Connection, change: &ChangeRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO bookmark_clock (row_id, col, value, version, site_id, causal_length, seq)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(row_id, col) DO UPDATE SET
            value = excluded.value,
            version = excluded.version,
            site_id = excluded.site_id,
            causal_length = excluded.causal_length,
            seq = excluded.seq",
        rusqlite::params![
            change.row_id,
            change.column,
            change.value,
            change.version,
            change.site_id,
            change.causal_length,
            change.seq,
        ],
    )?;
    Ok(())
}

/// Current causal length of a row, if the row has any clock entries.
pub fn row_causal_length(conn: &Connection, row_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(causal_length) FROM bookmark_clock WHERE row_id = ?1",
        [row_id],
        |row| row.get(0),
    )
}

/// Cell values of a row at the given causal length.
pub fn row_cells(
    conn: &Connection,
    row_id: i64,
    causal_length: i64,
) -> Result<Vec<(Column, String)>> {
    let mut stmt = conn.prepare(
        "SELECT col, value FROM bookmark_clock
         WHERE row_id = ?1 AND causal_length = ?2 AND value IS NOT NULL",
    )?;
    let rows = stmt.query_map([row_id, causal_length], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Every clock entry, ordered by row, column, version.
pub fn all_entries(conn: &Connection) -> Result<Vec<ChangeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT row_id, col, value, version, site_id, causal_length, seq
         FROM bookmark_clock
         ORDER BY row_id, col, version",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ChangeRecord {
            row_id: row.get(0)?,
            column: row.get(1)?,
            value: row.get(2)?,
            version: row.get(3)?,
            site_id: row.get(4)?,
            causal_length: row.get(5)?,
            seq: row.get(6)?,
        })
    })?;
    rows.collect()
}

/// Number of clock entries produced by `site_id` after `seq`.
pub fn count_site_entries_after(conn: &Connection, site_id: &str, seq: i64) -> Result<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM bookmark_clock WHERE site_id = ?1 AND seq > ?2",
        rusqlite::params![site_id, seq],
        |row| row.get(0),
    )
}

/// Largest row id present in the clock, 0 if empty.
pub fn max_row_id(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(row_id), 0) FROM bookmark_clock",
        [],
        |row| row.get(0),
    )
}

/// Whether the clock holds any history at all.
pub fn is_empty(conn: &Connection) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM bookmark_clock LIMIT 1")?
        .exists([])?;
    Ok(!exists)
}

/// Highest sequence seen from `site_id`, 0 if none.
pub fn site_seq(conn: &Connection, site_id: &str) -> Result<i64> {
    let seq: Option<i64> = conn
        .query_row(
            "SELECT seq FROM site_versions WHERE site_id = ?1",
            [site_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seq.unwrap_or(0))
}

/// Raise the vector entry of `site_id` to at least `seq`.
pub fn advance_site(conn: &Connection, site_id: &str, seq: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO site_versions (site_id, seq) VALUES (?1, ?2)
         ON CONFLICT(site_id) DO UPDATE SET seq = MAX(seq, excluded.seq)",
        rusqlite::params![site_id, seq],
    )?;
    Ok(())
}

/// Load the full site version vector.
pub fn load_vector(conn: &Connection) -> Result<SiteVersionVector> {
    let mut stmt = conn.prepare("SELECT site_id, seq FROM site_versions")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    rows.collect()
}

/// Persist every entry of a vector (entries only ever move up).
pub fn save_vector(conn: &Connection, vector: &SiteVersionVector) -> Result<()> {
    for (site, seq) in vector.iter() {
        advance_site(conn, site, seq)?;
    }
    Ok(())
}

/// Read a sync bookkeeping value.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM sync_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

/// Write a sync bookkeeping value.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn change(row_id: i64, column: Column, causal_length: i64) -> ChangeRecord {
        ChangeRecord {
            row_id,
            column,
            value: Some("v".into()),
            version: 1,
            site_id: "h1".into(),
            causal_length,
            seq: 1,
        }
    }

    #[test]
    fn test_put_entry_overwrites_cell() {
        let conn = conn();
        put_entry(&conn, &change(1, Column::Title, 1)).unwrap();
        let mut newer = change(1, Column::Title, 1);
        newer.version = 2;
        newer.site_id = "h2".into();
        put_entry(&conn, &newer).unwrap();

        let entry = get_entry(&conn, 1, Column::Title).unwrap().unwrap();
        assert_eq!(entry.key(), (1, 2, "h2"));
        assert_eq!(all_entries(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_row_causal_length_is_max() {
        let conn = conn();
        assert_eq!(row_causal_length(&conn, 1).unwrap(), None);
        put_entry(&conn, &change(1, Column::Title, 1)).unwrap();
        put_entry(&conn, &change(1, Column::Sentinel, 2)).unwrap();
        assert_eq!(row_causal_length(&conn, 1).unwrap(), Some(2));
    }

    #[test]
    fn test_advance_site_never_moves_back() {
        let conn = conn();
        advance_site(&conn, "h1", 5).unwrap();
        advance_site(&conn, "h1", 3).unwrap();
        assert_eq!(site_seq(&conn, "h1").unwrap(), 5);
        assert_eq!(site_seq(&conn, "h2").unwrap(), 0);
        assert_eq!(load_vector(&conn).unwrap().get("h1"), 5);
    }

    #[test]
    fn test_meta_round_trip() {
        let conn = conn();
        assert_eq!(get_meta(&conn, "exported_seq").unwrap(), None);
        set_meta(&conn, "exported_seq", "4").unwrap();
        set_meta(&conn, "exported_seq", "7").unwrap();
        assert_eq!(get_meta(&conn, "exported_seq").unwrap().as_deref(), Some("7"));
    }
}
