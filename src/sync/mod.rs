//! Change-log sync operations.
//!
//! This module provides file-mediated replication through a shared change
//! directory:
//!
//! - **Export**: local clock → this host's change file (full snapshot)
//! - **Import**: peers' change files → SQLite with per-cell last-writer-wins
//! - **Codec**: header + JSON-lines blob format with checksum
//! - **Status**: pending changes, change files, and seen versions
//!
//! # Architecture
//!
//! Every write to the store is stamped per column:
//! 1. Local mutations record `(version, site_id, causal_length, seq)` per cell
//! 2. Export writes every clock entry to `<changes>/<host>`
//! 3. Import skips what the site version vector has seen and merges the rest
//!
//! # Example
//!
//! ```ignore
//! use mark::sync::{Exporter, Importer, SyncDir};
//!
//! let dir = SyncDir::new(changes_dir);
//! let blobs = dir.read_all(storage.site_id())?;
//! let stats = Importer::new(&mut storage).reconcile(&blobs)?;
//!
//! let stats = Exporter::new(&mut storage, &dir).export()?;
//! ```

pub mod codec;
mod export;
mod file;
pub mod hash;
mod import;
mod status;
mod types;

// Re-export main types and functions
pub use codec::{ChangeLog, decode, encode};
pub use export::Exporter;
pub use file::{PeerBlob, PeerFile, SyncDir, atomic_write, file_size, validate_host_id};
pub use hash::{content_hash, has_changed};
pub use import::Importer;
pub use status::{get_sync_status, print_status};
pub use types::{
    ApplyStats, ChangeRecord, Column, ExportStats, ImportStats, PeerFileInfo, PeerImport,
    SiteVersionVector, SyncError, SyncResult, SyncStatus,
};
