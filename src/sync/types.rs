//! Sync types for change-log exchange.
//!
//! This module defines the column-level change records that replicas trade
//! through the shared change directory, the per-site version vector, and the
//! statistics reported by import and export.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A versioned column of the bookmark table.
///
/// `Sentinel` is not a real column: it carries row liveness through its
/// causal length and is written on insert and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    #[serde(rename = "__sentinel")]
    Sentinel,
    Url,
    Title,
    Description,
    Tags,
}

impl Column {
    /// The data columns, in table order.
    pub const DATA: [Self; 4] = [Self::Url, Self::Title, Self::Description, Self::Tags];

    /// Name used in the clock table and in change-log files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sentinel => "__sentinel",
            Self::Url => "url",
            Self::Title => "title",
            Self::Description => "description",
            Self::Tags => "tags",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "__sentinel" => Ok(Self::Sentinel),
            "url" => Ok(Self::Url),
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "tags" => Ok(Self::Tags),
            _ => Err(format!("Unknown column: {s}")),
        }
    }
}

impl ToSql for Column {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Column {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One column-level mutation.
///
/// Produced by the store for every local write, consumed by the codec and the
/// merge path, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub row_id: i64,
    pub column: Column,
    /// New cell value; `None` for the sentinel.
    pub value: Option<String>,
    /// Per-cell counter, bumped on every local write of this cell.
    pub version: i64,
    /// Replica that produced the write.
    pub site_id: String,
    /// Row incarnation: odd while alive, even once deleted.
    pub causal_length: i64,
    /// Originating site's transaction sequence number.
    pub seq: i64,
}

impl ChangeRecord {
    /// Merge ordering key: causal length, then version, then site id.
    #[must_use]
    pub fn clock_key(&self) -> (i64, i64, &str) {
        (self.causal_length, self.version, self.site_id.as_str())
    }

    /// Whether this change beats a stored clock entry for the same cell.
    ///
    /// Equal keys do not win, so re-applying a change is a no-op.
    #[must_use]
    pub fn wins_over(&self, current: (i64, i64, &str)) -> bool {
        self.clock_key() > current
    }
}

/// Per-site high-water mark of applied sequence numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteVersionVector(BTreeMap<String, i64>);

impl SiteVersionVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest sequence seen from `site_id`, 0 if none.
    #[must_use]
    pub fn get(&self, site_id: &str) -> i64 {
        self.0.get(site_id).copied().unwrap_or(0)
    }

    /// Raise the entry for `site_id` to at least `seq`.
    ///
    /// Returns true if the vector moved.
    pub fn observe(&mut self, site_id: &str, seq: i64) -> bool {
        let entry = self.0.entry(site_id.to_string()).or_insert(0);
        if seq > *entry {
            *entry = seq;
            true
        } else {
            false
        }
    }

    /// Whether `(site_id, seq)` has already been seen.
    #[must_use]
    pub fn dominates(&self, site_id: &str, seq: i64) -> bool {
        self.0.get(site_id).is_some_and(|&seen| seq <= seen)
    }

    /// Pointwise maximum with another vector.
    pub fn merge(&mut self, other: &Self) {
        for (site, &seq) in &other.0 {
            self.observe(site, seq);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(site, &seq)| (site.as_str(), seq))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, i64)> for SiteVersionVector {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut vector = Self::new();
        for (site, seq) in iter {
            vector.observe(&site, seq);
        }
        vector
    }
}

/// Outcome of applying a batch of changes to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    /// Changes that won and were written to the clock.
    pub applied: usize,
    /// Changes that lost (or tied) against the stored clock entry.
    pub ignored: usize,
    /// Distinct rows whose materialized record was re-derived.
    pub rows_touched: usize,
}

/// Per-peer outcome of an import.
#[derive(Debug, Clone, Serialize)]
pub struct PeerImport {
    pub host_id: String,
    /// Records in the peer file.
    pub records: usize,
    /// Records skipped because the vector had already seen them.
    pub already_seen: usize,
    pub applied: usize,
    pub ignored: usize,
}

/// Statistics for an import (reconcile) pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub peers: Vec<PeerImport>,
    /// Hosts whose change file could not be read or decoded.
    pub corrupt_peers: Vec<String>,
    /// Vector after the import.
    pub vector: SiteVersionVector,
}

impl ImportStats {
    /// Total changes that won against local state.
    #[must_use]
    pub fn total_applied(&self) -> usize {
        self.peers.iter().map(|p| p.applied).sum()
    }

}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Records in the written change file.
    pub records: usize,
    /// Size of the change file in bytes.
    pub bytes: usize,
    /// Local sequence high-water mark at export time.
    pub site_seq: i64,
    /// False when the existing file was already identical.
    pub written: bool,
}

/// Sync status information.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub host_id: String,
    pub changes_dir: String,
    /// Local transaction sequence high-water mark.
    pub local_seq: i64,
    /// Local sequence covered by the last successful export.
    pub exported_seq: i64,
    /// Local change records not yet written to this host's file.
    pub pending_changes: usize,
    /// Unix millis of the last successful export.
    pub last_export_at: Option<i64>,
    pub bookmarks: usize,
    pub peer_files: Vec<PeerFileInfo>,
    pub vector: SiteVersionVector,
}

/// Information about one change file in the shared directory.
#[derive(Debug, Clone, Serialize)]
pub struct PeerFileInfo {
    pub host_id: String,
    pub size: u64,
    /// Record count from the header, `None` when the file does not decode.
    pub records: Option<usize>,
    pub is_self: bool,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store error raised while applying or exporting changes.
    #[error(transparent)]
    Store(Box<crate::error::Error>),

    /// A change file that cannot be trusted.
    #[error("Corrupt change log{}: {reason}", host.as_ref().map(|h| format!(" from {h}")).unwrap_or_default())]
    CorruptChangeLog {
        host: Option<String>,
        reason: String,
    },

    /// Host identity that cannot name a change file.
    #[error("Invalid host identity '{host}': {reason}")]
    InvalidHostId { host: String, reason: String },
}

impl SyncError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptChangeLog {
            host: None,
            reason: reason.into(),
        }
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Database(e) => Self::Database(e),
            other => Self::Store(Box::new(other)),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
