//! SQLite storage layer for mark.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - A per-cell clock recording the winning change of every column
//! - A full-text index kept in step by triggers
//!
//! # Submodules
//!
//! - [`clock`] - Clock and version-vector tables
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod clock;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, SqliteStorage};
