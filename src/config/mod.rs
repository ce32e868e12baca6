//! Configuration management.
//!
//! This module resolves where the store lives and which host this replica
//! is.
//!
//! # Architecture
//!
//! mark keeps one store per user:
//! - **Database**: `<root>/data.db`, root defaulting to `~/.config/mark`
//! - **Changes**: `<root>/changes/`, one change file per host, shared between
//!   machines by whatever file sync the user runs
//!
//! Every setting resolves the same way: explicit flag, then environment
//! variable, then default.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::sync::validate_host_id;

/// Environment variable overriding the store root.
pub const STORE_LOCATION_ENV: &str = "MARK_STORE_LOCATION";

/// Environment variable overriding the change directory.
pub const CHANGES_DIR_ENV: &str = "MARK_CHANGES_DIR";

/// Environment variable overriding the host identity.
pub const HOST_ID_ENV: &str = "MARK_HOST_ID";

/// Database file name inside the store root.
pub const DB_FILE_NAME: &str = "data.db";

/// Change directory name inside the store root.
pub const CHANGES_DIR_NAME: &str = "changes";

/// Resolved store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store root directory.
    pub root: PathBuf,
    /// Shared change directory.
    pub changes_dir: PathBuf,
    /// This replica's host identity; names its change file.
    pub host_id: String,
}

impl StoreConfig {
    /// Build a configuration rooted at `root` with the default change
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHostId` if `host_id` cannot name a file.
    pub fn new(root: impl Into<PathBuf>, host_id: &str) -> Result<Self> {
        let root = root.into();
        validate_host_id(host_id)?;
        Ok(Self {
            changes_dir: root.join(CHANGES_DIR_NAME),
            root,
            host_id: host_id.to_string(),
        })
    }

    /// Use a different change directory.
    #[must_use]
    pub fn with_changes_dir(mut self, changes_dir: impl Into<PathBuf>) -> Self {
        self.changes_dir = changes_dir.into();
        self
    }

    /// Resolve the configuration from flags and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no store root can be determined, the hostname
    /// cannot be read, or the host identity is invalid.
    pub fn resolve(
        store: Option<&Path>,
        changes_dir: Option<&Path>,
        host: Option<&str>,
    ) -> Result<Self> {
        let root = resolve_store_root(store)?;
        let changes_dir = resolve_changes_dir(changes_dir, &root);
        let host_id = resolve_host_id(host)?;
        validate_host_id(&host_id)?;

        debug!(
            root = %root.display(),
            changes = %changes_dir.display(),
            host = %host_id,
            "Resolved store configuration"
        );

        Ok(Self {
            root,
            changes_dir,
            host_id,
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE_NAME)
    }
}

/// Read a non-blank environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default store root: `<config dir>/mark`.
#[must_use]
pub fn default_store_root() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.config_dir().join("mark"))
}

/// Resolve the store root.
///
/// Priority:
/// 1. If `explicit` is provided, use it directly
/// 2. `MARK_STORE_LOCATION` environment variable
/// 3. `~/.config/mark` (platform config directory)
///
/// # Errors
///
/// Returns `Error::Config` if no home directory can be found.
pub fn resolve_store_root(explicit: Option<&Path>) -> Result<PathBuf> {
    pick_store_root(explicit, env_value(STORE_LOCATION_ENV))
}

fn pick_store_root(explicit: Option<&Path>, env: Option<String>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env {
        return Ok(PathBuf::from(path));
    }
    default_store_root().ok_or_else(|| {
        Error::Config(format!(
            "Cannot determine a home directory; set {STORE_LOCATION_ENV}"
        ))
    })
}

/// Resolve the change directory.
///
/// Priority: explicit, `MARK_CHANGES_DIR`, `<root>/changes`.
#[must_use]
pub fn resolve_changes_dir(explicit: Option<&Path>, root: &Path) -> PathBuf {
    pick_changes_dir(explicit, env_value(CHANGES_DIR_ENV), root)
}

fn pick_changes_dir(explicit: Option<&Path>, env: Option<String>, root: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(|| root.join(CHANGES_DIR_NAME))
}

/// Resolve the host identity.
///
/// Priority: explicit, `MARK_HOST_ID`, the machine's hostname.
///
/// # Errors
///
/// Returns `Error::Config` if the hostname cannot be read.
pub fn resolve_host_id(explicit: Option<&str>) -> Result<String> {
    if let Some(host) = explicit {
        return Ok(host.to_string());
    }
    if let Some(host) = env_value(HOST_ID_ENV) {
        return Ok(host);
    }
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .map_err(|e| Error::Config(format!("Cannot read hostname: {e}; set {HOST_ID_ENV}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_root_priority() {
        let explicit = Path::new("/explicit");
        assert_eq!(
            pick_store_root(Some(explicit), Some("/env".into())).unwrap(),
            PathBuf::from("/explicit")
        );
        assert_eq!(
            pick_store_root(None, Some("/env".into())).unwrap(),
            PathBuf::from("/env")
        );
    }

    #[test]
    fn test_changes_dir_priority() {
        let root = Path::new("/store");
        assert_eq!(
            pick_changes_dir(None, None, root),
            PathBuf::from("/store/changes")
        );
        assert_eq!(
            pick_changes_dir(None, Some("/shared".into()), root),
            PathBuf::from("/shared")
        );
        assert_eq!(
            pick_changes_dir(Some(Path::new("/flag")), Some("/shared".into()), root),
            PathBuf::from("/flag")
        );
    }

    #[test]
    fn test_explicit_host_wins() {
        assert_eq!(resolve_host_id(Some("laptop")).unwrap(), "laptop");
    }

    #[test]
    fn test_resolve_rejects_bad_host() {
        let err =
            StoreConfig::resolve(Some(Path::new("/tmp/mark")), None, Some("a/b")).unwrap_err();
        assert!(matches!(err, Error::InvalidHostId { .. }));
    }

    #[test]
    fn test_new_uses_default_layout() {
        let config = StoreConfig::new("/store", "h1").unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/store/data.db"));
        assert_eq!(config.changes_dir, PathBuf::from("/store/changes"));

        let shared = config.with_changes_dir("/shared");
        assert_eq!(shared.changes_dir, PathBuf::from("/shared"));
    }
}
