//! Sync status display.
//!
//! This module provides functions to check the current sync state: what this
//! host has written that its change file does not yet carry, which peer
//! files are present, and how far the version vector has advanced.

use std::fs;

use colored::Colorize;

use crate::storage::sqlite::SqliteStorage;
use crate::sync::codec::decode;
use crate::sync::file::{SyncDir, file_size};
use crate::sync::types::{PeerFileInfo, SyncResult, SyncStatus};

/// Get the current sync status.
///
/// # Errors
///
/// Returns an error if database queries fail or the directory cannot be
/// listed.
pub fn get_sync_status(storage: &SqliteStorage, dir: &SyncDir) -> SyncResult<SyncStatus> {
    let host_id = storage.site_id().to_string();

    let mut peer_files = Vec::new();
    if dir.path().is_dir() {
        for file in dir.list_peer_files()? {
            let records = fs::read(&file.path)
                .ok()
                .and_then(|bytes| decode(&bytes).ok())
                .map(|log| log.changes.len());
            peer_files.push(PeerFileInfo {
                is_self: file.host_id == host_id,
                size: file_size(&file.path),
                host_id: file.host_id,
                records,
            });
        }
    }

    Ok(SyncStatus {
        changes_dir: dir.path().display().to_string(),
        local_seq: storage.local_seq()?,
        exported_seq: storage.exported_seq()?,
        pending_changes: storage.pending_local_changes()?,
        last_export_at: storage.last_export_at()?,
        bookmarks: storage.count_bookmarks()?,
        vector: storage.site_vector()?,
        host_id,
        peer_files,
    })
}

/// Print sync status to stdout.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    println!("{}", "Replica:".blue().bold());
    println!("  Host:          {}", status.host_id);
    println!("  Changes dir:   {}", status.changes_dir);
    println!("  Bookmarks:     {}", status.bookmarks);
    println!("  Local seq:     {}", status.local_seq);
    println!();

    if status.pending_changes > 0 {
        println!("{}", "Pending Export:".yellow().bold());
        println!("  Changes:       {}", status.pending_changes);
        println!();
        println!(
            "{}",
            "Changes are written to the change directory when the store closes.".dimmed()
        );
    } else {
        println!("{}", "No pending changes to export.".green());
    }
    if let Some(at) = status.last_export_at.and_then(chrono::DateTime::from_timestamp_millis) {
        println!("  Last export:   {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();

    if status.peer_files.is_empty() {
        println!("{}", "No change files found.".dimmed());
    } else {
        println!("{}", "Change Files:".blue().bold());
        for file in &status.peer_files {
            let size_str = format_size(file.size);
            let records = match file.records {
                Some(n) => format!("{n} records"),
                None => "unreadable".red().to_string(),
            };
            let marker = if file.is_self { " (this host)" } else { "" };
            println!("  {}{marker} ({size_str}, {records})", file.host_id);
        }
    }

    if !status.vector.is_empty() {
        println!();
        println!("{}", "Seen Versions:".blue().bold());
        for (site, seq) in status.vector.iter() {
            println!("  {site}: {seq}");
        }
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bookmark;
    use crate::sync::Exporter;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_get_sync_status_empty() {
        let temp_dir = TempDir::new().unwrap();
        let dir = SyncDir::new(temp_dir.path().join("missing"));
        let storage = SqliteStorage::open_memory("h1").unwrap();

        let status = get_sync_status(&storage, &dir).unwrap();

        assert_eq!(status.host_id, "h1");
        assert_eq!(status.local_seq, 0);
        assert_eq!(status.pending_changes, 0);
        assert_eq!(status.bookmarks, 0);
        assert!(status.peer_files.is_empty());
        assert!(status.last_export_at.is_none());
    }

    #[test]
    fn test_get_sync_status_tracks_pending_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = SyncDir::new(temp_dir.path());
        let mut storage = SqliteStorage::open_memory("h1").unwrap();
        storage.insert_bookmark(&Bookmark::new("https://x.com")).unwrap();

        let before = get_sync_status(&storage, &dir).unwrap();
        assert_eq!(before.pending_changes, 5);

        Exporter::new(&mut storage, &dir).export().unwrap();
        fs::write(temp_dir.path().join("h2"), b"not a change log").unwrap();

        let after = get_sync_status(&storage, &dir).unwrap();
        assert_eq!(after.pending_changes, 0);
        assert_eq!(after.exported_seq, 1);
        assert_eq!(after.peer_files.len(), 2);
        assert!(after.peer_files[0].is_self);
        assert_eq!(after.peer_files[0].records, Some(5));
        assert_eq!(after.peer_files[1].records, None);
    }
}
