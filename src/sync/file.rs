//! Shared change-directory operations.
//!
//! The change directory holds exactly one file per host, named after the host
//! identity. Files are replaced atomically (write temp, fsync, rename) so a
//! peer reading the folder never sees a half-written change log.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::sync::types::{SyncError, SyncResult};

/// Suffix of in-flight temp files.
const TEMP_SUFFIX: &str = ".tmp";

/// Check that a host identity can name a change file.
///
/// # Errors
///
/// Returns `SyncError::InvalidHostId` describing the first rule broken.
pub fn validate_host_id(host: &str) -> SyncResult<()> {
    let reason = if host.is_empty() {
        Some("must not be empty")
    } else if host.len() > 255 {
        Some("must be at most 255 bytes")
    } else if host.starts_with('.') {
        Some("must not start with '.'")
    } else if host.ends_with(TEMP_SUFFIX) {
        Some("must not end with '.tmp'")
    } else if host.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if host.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SyncError::InvalidHostId {
            host: host.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// A change file found in the shared directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFile {
    pub host_id: String,
    pub path: PathBuf,
}

/// Raw contents of a peer's change file.
#[derive(Debug, Clone)]
pub struct PeerBlob {
    pub host_id: String,
    pub bytes: Vec<u8>,
}

/// The shared change directory.
#[derive(Debug, Clone)]
pub struct SyncDir {
    path: PathBuf,
}

impl SyncDir {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the change file for `host_id`.
    #[must_use]
    pub fn file_for(&self, host_id: &str) -> PathBuf {
        self.path.join(host_id)
    }

    /// Create the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure(&self) -> SyncResult<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Every change file in the directory, attributed to its host.
    ///
    /// Entries that are not regular files or whose names are not valid host
    /// identities (temp files, dotfiles, non-UTF-8 names) are skipped.
    /// Results are sorted by host id.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn list_peer_files(&self) -> SyncResult<Vec<PeerFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                debug!(path = %entry.path().display(), "Skipping non-UTF-8 change file name");
                continue;
            };
            if validate_host_id(&name).is_err() {
                debug!(name, "Skipping file that does not name a host");
                continue;
            }
            files.push(PeerFile {
                host_id: name,
                path: entry.path(),
            });
        }

        files.sort_by(|a, b| a.host_id.cmp(&b.host_id));
        Ok(files)
    }

    /// Read every peer's change file except `self_host`'s.
    ///
    /// A file that disappears or cannot be read between listing and reading
    /// is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn read_all(&self, self_host: &str) -> SyncResult<Vec<PeerBlob>> {
        let mut blobs = Vec::new();
        for file in self.list_peer_files()? {
            if file.host_id == self_host {
                continue;
            }
            match fs::read(&file.path) {
                Ok(bytes) => blobs.push(PeerBlob {
                    host_id: file.host_id,
                    bytes,
                }),
                Err(e) => {
                    warn!(host = %file.host_id, error = %e, "Unreadable change file, skipping");
                }
            }
        }
        Ok(blobs)
    }

    /// Read this host's own change file, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_self(&self, host_id: &str) -> SyncResult<Option<PeerBlob>> {
        let path = self.file_for(host_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(PeerBlob {
            host_id: host_id.to_string(),
            bytes: fs::read(path)?,
        }))
    }

    /// Atomically replace this host's change file.
    ///
    /// # Errors
    ///
    /// Returns an error if the host id is invalid or the write fails.
    pub fn write_self(&self, host_id: &str, blob: &[u8]) -> SyncResult<PathBuf> {
        validate_host_id(host_id)?;
        let path = self.file_for(host_id);
        atomic_write(&path, blob)?;
        Ok(path)
    }
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a hidden temp file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> SyncResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SyncError::Io(std::io::Error::other("target path has no file name")))?;
    let temp_path = path.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let written = (|| -> std::io::Result<()> {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("h1");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temp file left behind
        assert!(!temp_dir.path().join(".h1.tmp").exists());
    }

    #[test]
    fn test_list_peer_files_skips_malformed_names() {
        let temp_dir = TempDir::new().unwrap();
        let dir = SyncDir::new(temp_dir.path());
        fs::write(temp_dir.path().join("h2"), b"x").unwrap();
        fs::write(temp_dir.path().join("h1"), b"x").unwrap();
        fs::write(temp_dir.path().join(".h3.tmp"), b"x").unwrap();
        fs::write(temp_dir.path().join(".DS_Store"), b"x").unwrap();
        fs::create_dir(temp_dir.path().join("subdir")).unwrap();

        let hosts: Vec<String> = dir
            .list_peer_files()
            .unwrap()
            .into_iter()
            .map(|f| f.host_id)
            .collect();
        assert_eq!(hosts, vec!["h1".to_string(), "h2".to_string()]);
    }

    #[test]
    fn test_read_all_excludes_self() {
        let temp_dir = TempDir::new().unwrap();
        let dir = SyncDir::new(temp_dir.path());
        dir.write_self("h1", b"from h1").unwrap();
        dir.write_self("h2", b"from h2").unwrap();

        let blobs = dir.read_all("h1").unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].host_id, "h2");
        assert_eq!(blobs[0].bytes, b"from h2");

        let own = dir.read_self("h1").unwrap().unwrap();
        assert_eq!(own.bytes, b"from h1");
        assert!(dir.read_self("h9").unwrap().is_none());
    }

    #[test]
    fn test_write_self_rejects_path_like_host() {
        let temp_dir = TempDir::new().unwrap();
        let dir = SyncDir::new(temp_dir.path());
        let err = dir.write_self("../escape", b"x").unwrap_err();
        assert!(matches!(err, SyncError::InvalidHostId { .. }));
    }

    #[test]
    fn test_validate_host_id() {
        assert!(validate_host_id("laptop").is_ok());
        assert!(validate_host_id("host-a.local").is_ok());
        assert!(validate_host_id("").is_err());
        assert!(validate_host_id(".hidden").is_err());
        assert!(validate_host_id("h1.tmp").is_err());
        assert!(validate_host_id("a/b").is_err());
        assert!(validate_host_id("tab\there").is_err());
    }

    #[test]
    fn test_file_size_missing_is_zero() {
        assert_eq!(file_size(Path::new("/nonexistent/change/file")), 0);
    }
}
