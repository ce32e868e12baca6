//! mark - bookmarks replicated between machines through a shared folder.
//!
//! Each machine keeps its own SQLite store and writes one change file into a
//! shared directory; opening a store merges every other machine's change
//! file with per-column last-writer-wins.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Bookmark)
//! - [`storage`] - SQLite versioned record store
//! - [`sync`] - Change-log codec, change directory, import/export
//! - [`store`] - Open/close lifecycle and repository API
//! - [`config`] - Store location and host identity
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod store;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
pub use model::Bookmark;
pub use store::BookmarkStore;
