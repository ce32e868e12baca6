//! Command implementations.

pub mod bookmark;
pub mod completions;
pub mod keys;
pub mod sync;
pub mod version;

use crate::cli::Cli;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::store::BookmarkStore;

/// Resolve the store configuration from global flags and environment.
///
/// # Errors
///
/// Returns an error if the configuration cannot be resolved.
pub fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    StoreConfig::resolve(
        cli.store.as_deref(),
        cli.changes_dir.as_deref(),
        cli.host.as_deref(),
    )
}

/// Open the store, run `f`, and close the store.
///
/// The store is closed (and its change file exported) even if `f` fails;
/// the error from `f` takes precedence.
///
/// # Errors
///
/// Returns an error from opening, from `f`, or from closing.
pub fn with_store<T>(cli: &Cli, f: impl FnOnce(&mut BookmarkStore) -> Result<T>) -> Result<T> {
    let config = resolve_config(cli)?;
    let mut store = BookmarkStore::open(&config)?;

    let result = f(&mut store);
    let closed = store.close();

    let value = result?;
    closed?;
    Ok(value)
}
