//! Bookmark store with an explicit open/close lifecycle.
//!
//! Opening a store merges every peer's change file before handing out the
//! store; closing it writes this host's change file and releases the
//! database. All writes go through the versioned path in
//! [`SqliteStorage`], so everything done between open and close reaches the
//! next export.

use std::fs;

use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::Bookmark;
use crate::storage::SqliteStorage;
use crate::sync::{
    ExportStats, Exporter, ImportStats, Importer, SyncDir, SyncStatus, get_sync_status,
};
use crate::validate::{find_similar_urls, normalize_tags, validate_url};

/// An open bookmark store.
#[derive(Debug)]
pub struct BookmarkStore {
    storage: SqliteStorage,
    dir: SyncDir,
    config: StoreConfig,
    last_import: ImportStats,
}

impl BookmarkStore {
    /// Open the store and merge all peer change files.
    ///
    /// Corrupt peer files are skipped with a warning. A database without any
    /// history also imports this host's own change file, recovering what a
    /// previous database on this host exported.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created, the database
    /// cannot be opened, or a merge fails in the database.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).map_err(|e| Error::StoreLayout {
            path: config.root.clone(),
            reason: e.to_string(),
        })?;
        let dir = SyncDir::new(&config.changes_dir);
        dir.ensure().map_err(|e| Error::StoreLayout {
            path: config.changes_dir.clone(),
            reason: e.to_string(),
        })?;

        let mut storage = SqliteStorage::open(&config.db_path(), &config.host_id)?;

        let mut blobs = Vec::new();
        if !storage.has_history()? {
            match dir.read_self(&config.host_id) {
                Ok(Some(own)) => {
                    info!(
                        host = %config.host_id,
                        "Empty database, recovering from own change file"
                    );
                    blobs.push(own);
                }
                Ok(None) => {}
                Err(e) => warn!(host = %config.host_id, error = %e, "Own change file unreadable"),
            }
        }
        blobs.extend(dir.read_all(&config.host_id)?);

        let last_import = Importer::new(&mut storage).reconcile(&blobs)?;

        info!(
            host = %config.host_id,
            peers = last_import.peers.len(),
            applied = last_import.total_applied(),
            "Store opened"
        );

        Ok(Self {
            storage,
            dir,
            config: config.clone(),
            last_import,
        })
    }

    /// Export this host's change file and release the database.
    ///
    /// The database handle is released even when the export fails.
    ///
    /// # Errors
    ///
    /// Returns the export error, or the close error if only closing failed.
    pub fn close(self) -> Result<ExportStats> {
        let Self {
            mut storage, dir, ..
        } = self;

        let exported = Exporter::new(&mut storage, &dir).export();
        let closed = storage.close();

        let stats = exported?;
        closed?;
        info!(records = stats.records, written = stats.written, "Store closed");
        Ok(stats)
    }

    /// The resolved configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Outcome of the import performed by [`BookmarkStore::open`].
    #[must_use]
    pub fn last_import(&self) -> &ImportStats {
        &self.last_import
    }

    /// Read access to the underlying versioned store.
    #[must_use]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    // ==================
    // Bookmarks
    // ==================

    /// Add a bookmark, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for a malformed URL or tag.
    pub fn insert(&mut self, bookmark: &Bookmark) -> Result<i64> {
        let bookmark = Self::normalized(bookmark)?;
        self.storage.insert_bookmark(&bookmark)
    }

    /// Replace every bookmark whose URL is `match_url` with `bookmark`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BookmarkNotFound` if nothing matches.
    pub fn update(&mut self, match_url: &str, bookmark: &Bookmark) -> Result<usize> {
        let bookmark = Self::normalized(bookmark)?;
        self.storage
            .update_bookmark(match_url, &bookmark)
            .map_err(|e| self.with_suggestions(e))
    }

    /// Delete every bookmark whose URL is `url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BookmarkNotFound` if nothing matches.
    pub fn delete(&mut self, url: &str) -> Result<usize> {
        self.storage
            .delete_bookmark(url)
            .map_err(|e| self.with_suggestions(e))
    }

    /// Full-text search, best matches first.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an empty query.
    pub fn search(&self, query: &str) -> Result<Vec<Bookmark>> {
        self.storage.search_bookmarks(query.trim())
    }

    /// Get a bookmark by URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_by_url(&self, url: &str) -> Result<Option<Bookmark>> {
        self.storage.get_bookmark_by_url(url)
    }

    /// All bookmarks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self) -> Result<Vec<Bookmark>> {
        Ok(self
            .storage
            .list_bookmarks()?
            .into_iter()
            .map(|(_, bookmark)| bookmark)
            .collect())
    }

    /// Stored URLs close to `url`, for not-found hints.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn similar_urls(&self, url: &str) -> Result<Vec<String>> {
        let urls: Vec<String> = self.list()?.into_iter().map(|b| b.url).collect();
        Ok(find_similar_urls(url, &urls, 3))
    }

    /// Attach close URL matches to a not-found error.
    #[must_use]
    pub fn with_suggestions(&self, err: Error) -> Error {
        let Error::BookmarkNotFound { url } = err else {
            return err;
        };
        let similar = self.similar_urls(&url).unwrap_or_default();
        if similar.is_empty() {
            Error::BookmarkNotFound { url }
        } else {
            Error::BookmarkNotFoundSimilar { url, similar }
        }
    }

    fn normalized(bookmark: &Bookmark) -> Result<Bookmark> {
        validate_url(&bookmark.url)?;
        Ok(Bookmark {
            tags: normalize_tags(&bookmark.tags)?,
            ..bookmark.clone()
        })
    }

    // ==================
    // Access Keys
    // ==================

    /// Generate and store a new access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be stored.
    pub fn new_key(&mut self) -> Result<String> {
        let key = uuid::Uuid::new_v4().simple().to_string();
        self.storage.add_key(&key)?;
        Ok(key)
    }

    /// Store a caller-supplied access key.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateKey` if it already exists.
    pub fn add_key(&mut self, key: &str) -> Result<()> {
        self.storage.add_key(key)
    }

    /// Whether `key` is a stored access key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_key(&self, key: &str) -> Result<bool> {
        self.storage.has_key(key)
    }

    /// All access keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        self.storage.list_keys()
    }

    /// Delete an access key.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if it does not exist.
    pub fn delete_key(&mut self, key: &str) -> Result<()> {
        if self.storage.delete_key(key)? {
            Ok(())
        } else {
            Err(Error::KeyNotFound {
                key: key.to_string(),
            })
        }
    }

    // ==================
    // Sync
    // ==================

    /// Current sync status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or directory cannot be read.
    pub fn sync_status(&self) -> Result<SyncStatus> {
        Ok(get_sync_status(&self.storage, &self.dir)?)
    }
}
