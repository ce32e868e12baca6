//! Input validation for bookmark fields.
//!
//! Everything that reaches the versioned store passes through here first, so
//! stored URLs have a scheme and stored tags survive the `", "` join.

use crate::error::{Error, Result};

/// Check that a URL is non-empty and shaped like `scheme://rest`.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` describing what is wrong.
pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::InvalidArgument("URL must not be empty".to_string()));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!(
            "URL must not contain whitespace: '{url}'"
        )));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(Error::InvalidArgument(format!(
            "URL must look like scheme://host: '{url}'"
        )));
    };

    let scheme_ok = scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok || rest.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "URL must look like scheme://host: '{url}'"
        )));
    }

    Ok(())
}

/// Trim tags and drop empties, rejecting tags that would split on storage.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` for a tag containing a comma.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Result<Vec<String>> {
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if tag.contains(',') {
            return Err(Error::InvalidArgument(format!(
                "Tag must not contain a comma: '{tag}'"
            )));
        }
        normalized.push(tag.to_string());
    }
    Ok(normalized)
}

/// Parse a comma-separated tag list as typed on the command line.
#[must_use]
pub fn parse_tag_list(input: &str) -> Vec<String> {
    crate::model::split_tags(input)
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find stored URLs close to one that was not found.
///
/// Returns up to `max` suggestions within a small edit distance, closest
/// first, then alphabetically.
#[must_use]
pub fn find_similar_urls(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let threshold = (searched.chars().count() / 5).clamp(2, 8);
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|url| (levenshtein_distance(searched, url), url.as_str()))
        .filter(|(dist, _)| *dist <= threshold)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    candidates.dedup_by(|a, b| a.1 == b.1);

    candidates
        .into_iter()
        .take(max)
        .map(|(_, url)| url.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://x.com").is_ok());
        assert!(validate_url("ftp://files.example/a b").is_err());
        assert!(validate_url("git+ssh://host/repo").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("x.com").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("1http://x.com").is_err());
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(
            normalize_tags(&[" rust ", "", "db"]).unwrap(),
            vec!["rust", "db"]
        );
        assert!(normalize_tags(&["a,b"]).is_err());
        assert!(normalize_tags::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(parse_tag_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_tag_list("").is_empty());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_urls() {
        let urls = vec![
            "https://x.com".to_string(),
            "https://y.com".to_string(),
            "https://example.org/long/path".to_string(),
        ];
        let result = find_similar_urls("https://x.co", &urls, 3);
        assert_eq!(result.first().map(String::as_str), Some("https://x.com"));
        assert!(!result.contains(&"https://example.org/long/path".to_string()));
    }
}
