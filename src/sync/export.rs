//! Change-log export functionality.
//!
//! # Snapshot Mode
//!
//! Exports use **snapshot mode**: a host's change file holds its entire
//! clock, its own writes and everything it relays from peers, not only what
//! changed since the last export. Writing the same state twice produces
//! byte-identical output, and an unchanged file is not rewritten.

use std::fs;

use tracing::{debug, info};

use crate::storage::sqlite::SqliteStorage;
use crate::sync::codec::{ChangeLog, encode};
use crate::sync::file::SyncDir;
use crate::sync::hash::{content_hash, has_changed};
use crate::sync::types::{ExportStats, SiteVersionVector, SyncResult};

/// Exporter for this host's change file.
pub struct Exporter<'a> {
    storage: &'a mut SqliteStorage,
    dir: &'a SyncDir,
}

impl<'a> Exporter<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, dir: &'a SyncDir) -> Self {
        Self { storage, dir }
    }

    /// Build this host's change log from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn build(&self) -> SyncResult<ChangeLog> {
        let host = self.storage.site_id();
        let changes = self.storage.export_changes_since(&SiteVersionVector::new())?;
        Ok(ChangeLog::new(host, changes).with_site_seq(self.storage.local_seq()?))
    }

    /// Write this host's change file, skipping the write if unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the file cannot be
    /// written. The previous file is left intact on failure.
    pub fn export(&mut self) -> SyncResult<ExportStats> {
        let log = self.build()?;
        let blob = encode(&log)?;
        let host = self.storage.site_id().to_string();

        self.dir.ensure()?;
        let path = self.dir.file_for(&host);
        let existing = fs::read(&path).ok().map(|bytes| content_hash(&bytes));
        let written = has_changed(&content_hash(&blob), existing.as_deref());

        if written {
            self.dir.write_self(&host, &blob)?;
            info!(
                host = %host,
                records = log.changes.len(),
                bytes = blob.len(),
                "Exported change log"
            );
        } else {
            debug!(host = %host, "Change log unchanged, skipping write");
        }

        self.storage.record_export(log.site_seq)?;

        Ok(ExportStats {
            records: log.changes.len(),
            bytes: blob.len(),
            site_seq: log.site_seq,
            written,
        })
    }
}
