//! Bookmark model.
//!
//! A bookmark is a flat record. Tags are an ordered list in memory and a
//! single `", "`-joined string in the database.

use serde::{Deserialize, Serialize};

use crate::sync::Column;

/// Separator used to join tags for storage.
pub const TAG_SEPARATOR: &str = ", ";

/// A bookmark record.
///
/// Serializes as the flat object `{url, title, description, tags[]}` used by
/// every outward-facing surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Bookmark {
    /// Create a bookmark with only a URL set.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Tags joined for storage.
    #[must_use]
    pub fn joined_tags(&self) -> String {
        join_tags(&self.tags)
    }

    /// The stored text of one data column.
    ///
    /// Returns `None` for the sentinel.
    #[must_use]
    pub fn column_value(&self, column: Column) -> Option<String> {
        match column {
            Column::Url => Some(self.url.clone()),
            Column::Title => Some(self.title.clone()),
            Column::Description => Some(self.description.clone()),
            Column::Tags => Some(self.joined_tags()),
            Column::Sentinel => None,
        }
    }

    /// Set one data column from its stored text.
    pub fn set_column(&mut self, column: Column, value: &str) {
        match column {
            Column::Url => self.url = value.to_string(),
            Column::Title => self.title = value.to_string(),
            Column::Description => self.description = value.to_string(),
            Column::Tags => self.tags = split_tags(value),
            Column::Sentinel => {}
        }
    }
}

/// Join tags for storage.
#[must_use]
pub fn join_tags(tags: &[String]) -> String {
    tags.join(TAG_SEPARATOR)
}

/// Split a stored tag string back into tags.
///
/// An empty string yields no tags.
#[must_use]
pub fn split_tags(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_join_and_split() {
        let bookmark = Bookmark::new("https://x.com").with_tags(["a", "b"]);
        assert_eq!(bookmark.joined_tags(), "a, b");
        assert_eq!(split_tags("a, b"), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_tags_round_trip_to_empty() {
        assert!(split_tags("").is_empty());
        assert_eq!(Bookmark::new("https://x.com").joined_tags(), "");
    }

    #[test]
    fn test_column_accessors() {
        let mut bookmark = Bookmark::new("https://x.com").with_title("X");
        assert_eq!(bookmark.column_value(Column::Title).as_deref(), Some("X"));
        assert_eq!(bookmark.column_value(Column::Sentinel), None);

        bookmark.set_column(Column::Tags, "rust, sync");
        assert_eq!(bookmark.tags, vec!["rust", "sync"]);
    }

    #[test]
    fn test_serializes_flat() {
        let bookmark = Bookmark::new("https://x.com")
            .with_title("X")
            .with_tags(["a", "b"]);
        let json = serde_json::to_value(&bookmark).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://x.com",
                "title": "X",
                "description": "",
                "tags": ["a", "b"],
            })
        );

        let parsed: Bookmark = serde_json::from_str(r#"{"url":"https://y.com"}"#).unwrap();
        assert_eq!(parsed, Bookmark::new("https://y.com"));
    }
}
