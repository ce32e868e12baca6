//! Data models for mark.

pub mod bookmark;

pub use bookmark::{Bookmark, join_tags, split_tags};
