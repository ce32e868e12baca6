//! Change-log import functionality.
//!
//! This module merges peers' change files into the local store. Each peer
//! file is decoded and checked in full before anything is applied, and is
//! then applied in its own transaction together with the version vector
//! update, so a file is either merged completely or not at all.

use tracing::{debug, info, warn};

use crate::storage::sqlite::SqliteStorage;
use crate::sync::codec;
use crate::sync::file::PeerBlob;
use crate::sync::types::{ImportStats, PeerImport, SiteVersionVector, SyncError, SyncResult};

/// Importer for peer change files.
///
/// The importer skips records the local version vector has already seen and
/// hands the rest to the store's last-writer-wins merge.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
}

impl<'a> Importer<'a> {
    /// Create a new importer.
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self { storage }
    }

    /// Merge every peer blob into the store.
    ///
    /// Corrupt blobs are logged and skipped; the remaining peers are still
    /// merged. Blobs are processed in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error if the local database fails. Peers merged before the
    /// failure stay merged.
    pub fn reconcile(&mut self, blobs: &[PeerBlob]) -> SyncResult<ImportStats> {
        let mut vector = self.storage.site_vector()?;
        let mut stats = ImportStats::default();

        for blob in blobs {
            match self.import_blob(blob, &mut vector) {
                Ok(peer) => stats.peers.push(peer),
                Err(e @ SyncError::CorruptChangeLog { .. }) => {
                    warn!(host = %blob.host_id, error = %e, "Skipping corrupt change log");
                    stats.corrupt_peers.push(blob.host_id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            peers = stats.peers.len(),
            corrupt = stats.corrupt_peers.len(),
            applied = stats.total_applied(),
            "Reconciled peer change logs"
        );

        stats.vector = vector;
        Ok(stats)
    }

    /// Merge one peer blob, advancing `vector` to everything it carried.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::CorruptChangeLog` if the blob does not decode or
    /// its header names a different host than its file; database errors
    /// otherwise.
    pub fn import_blob(
        &mut self,
        blob: &PeerBlob,
        vector: &mut SiteVersionVector,
    ) -> SyncResult<PeerImport> {
        let log = codec::decode(&blob.bytes).map_err(|e| attribute(e, &blob.host_id))?;

        if log.host_id != blob.host_id {
            return Err(SyncError::CorruptChangeLog {
                host: Some(blob.host_id.clone()),
                reason: format!("header names host '{}'", log.host_id),
            });
        }

        let mut observed = SiteVersionVector::new();
        observed.observe(&log.host_id, log.site_seq);

        let mut fresh = Vec::new();
        let mut already_seen = 0;
        for change in log.changes {
            observed.observe(&change.site_id, change.seq);
            if vector.dominates(&change.site_id, change.seq) {
                already_seen += 1;
            } else {
                fresh.push(change);
            }
        }

        let applied = self.storage.apply_changes_observing(&fresh, &observed)?;
        vector.merge(&observed);

        debug!(
            host = %blob.host_id,
            already_seen,
            applied = applied.applied,
            ignored = applied.ignored,
            "Imported change log"
        );

        Ok(PeerImport {
            host_id: blob.host_id.clone(),
            records: already_seen + fresh.len(),
            already_seen,
            applied: applied.applied,
            ignored: applied.ignored,
        })
    }
}

/// Attribute a decode failure to the file it came from.
fn attribute(err: SyncError, host: &str) -> SyncError {
    let reason = match err {
        SyncError::CorruptChangeLog { reason, .. } => reason,
        other => other.to_string(),
    };
    SyncError::CorruptChangeLog {
        host: Some(host.to_string()),
        reason,
    }
}
