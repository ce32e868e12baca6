//! Change-log blob encoding.
//!
//! A change file is UTF-8 text: one JSON header line, then one JSON object per
//! change record.
//!
//! ```text
//! {"format":"mark-changelog","version":1,"host":"h1","site_seq":7,"count":2,"checksum":"9f86..."}
//! {"row_id":1,"column":"__sentinel","value":null,"version":1,"site_id":"h1","causal_length":1,"seq":7}
//! {"row_id":1,"column":"title","value":"X","version":1,"site_id":"h1","causal_length":1,"seq":7}
//! ```
//!
//! The checksum covers every byte after the header line. Decoding validates
//! the header, the record count and the checksum before returning anything,
//! so a truncated or half-synced file is rejected whole.

use serde::{Deserialize, Serialize};

use crate::sync::hash::content_hash;
use crate::sync::types::{ChangeRecord, SyncError, SyncResult};

/// Format tag written into every header.
pub const FORMAT_TAG: &str = "mark-changelog";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    version: u32,
    host: String,
    site_seq: i64,
    count: usize,
    checksum: String,
}

/// A host's complete outgoing change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLog {
    pub host_id: String,
    /// The host's local sequence high-water mark when the log was written.
    pub site_seq: i64,
    pub changes: Vec<ChangeRecord>,
}

impl ChangeLog {
    /// Build a log, deriving `site_seq` from the host's own records.
    #[must_use]
    pub fn new(host_id: &str, changes: Vec<ChangeRecord>) -> Self {
        let site_seq = changes
            .iter()
            .filter(|c| c.site_id == host_id)
            .map(|c| c.seq)
            .max()
            .unwrap_or(0);
        Self {
            host_id: host_id.to_string(),
            site_seq,
            changes,
        }
    }

    /// Override the sequence high-water mark.
    #[must_use]
    pub fn with_site_seq(mut self, site_seq: i64) -> Self {
        self.site_seq = self.site_seq.max(site_seq);
        self
    }
}

/// Encode a change log into a blob.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized.
pub fn encode(log: &ChangeLog) -> SyncResult<Vec<u8>> {
    let mut body = String::new();
    for change in &log.changes {
        body.push_str(&serde_json::to_string(change)?);
        body.push('\n');
    }

    let header = Header {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        host: log.host_id.clone(),
        site_seq: log.site_seq,
        count: log.changes.len(),
        checksum: content_hash(body.as_bytes()),
    };

    let mut blob = serde_json::to_string(&header)?;
    blob.push('\n');
    blob.push_str(&body);
    Ok(blob.into_bytes())
}

/// Decode a blob back into a change log.
///
/// # Errors
///
/// Returns `SyncError::CorruptChangeLog` for anything that is not a complete,
/// well-formed change log.
pub fn decode(blob: &[u8]) -> SyncResult<ChangeLog> {
    let text = std::str::from_utf8(blob).map_err(|_| SyncError::corrupt("not valid UTF-8"))?;

    let (header_line, body) = text
        .split_once('\n')
        .ok_or_else(|| SyncError::corrupt("missing header line"))?;

    let header: Header = serde_json::from_str(header_line)
        .map_err(|e| SyncError::corrupt(format!("unreadable header: {e}")))?;

    let corrupt = |reason: String| SyncError::CorruptChangeLog {
        host: Some(header.host.clone()),
        reason,
    };

    if header.format != FORMAT_TAG {
        return Err(corrupt(format!("unexpected format tag '{}'", header.format)));
    }
    if header.version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            header.version
        )));
    }
    if !(0..i64::MAX).contains(&header.site_seq) {
        return Err(corrupt(format!("site sequence {} out of range", header.site_seq)));
    }
    if content_hash(body.as_bytes()) != header.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let mut changes = Vec::with_capacity(header.count);
    for (line_num, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let change: ChangeRecord = serde_json::from_str(line)
            .map_err(|e| corrupt(format!("invalid record at line {}: {e}", line_num + 2)))?;
        if let Some(reason) = counter_error(&change) {
            return Err(corrupt(format!("record at line {}: {reason}", line_num + 2)));
        }
        changes.push(change);
    }

    if changes.len() != header.count {
        return Err(corrupt(format!(
            "header declares {} records, found {}",
            header.count,
            changes.len()
        )));
    }

    Ok(ChangeLog {
        host_id: header.host,
        site_seq: header.site_seq,
        changes,
    })
}

/// Largest row id a peer may send; leaves room to allocate ids above it.
const MAX_ROW_ID: i64 = i64::MAX >> 1;

/// Counters a local write will increment must stay below `i64::MAX`.
fn counter_error(change: &ChangeRecord) -> Option<String> {
    if !(1..=MAX_ROW_ID).contains(&change.row_id) {
        return Some(format!("row id {} out of range", change.row_id));
    }
    [
        ("version", change.version),
        ("causal length", change.causal_length),
        ("seq", change.seq),
    ]
    .into_iter()
    .find(|(_, value)| !(1..i64::MAX).contains(value))
    .map(|(name, value)| format!("{name} {value} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::Column;

    fn sample_changes() -> Vec<ChangeRecord> {
        vec![
            ChangeRecord {
                row_id: 42,
                column: Column::Sentinel,
                value: None,
                version: 1,
                site_id: "h1".into(),
                causal_length: 1,
                seq: 3,
            },
            ChangeRecord {
                row_id: 42,
                column: Column::Title,
                value: Some("Title with \"quotes\"\nand a newline".into()),
                version: 2,
                site_id: "h1".into(),
                causal_length: 1,
                seq: 4,
            },
            ChangeRecord {
                row_id: 43,
                column: Column::Tags,
                value: Some("a, b".into()),
                version: 1,
                site_id: "h2".into(),
                causal_length: 1,
                seq: 9,
            },
        ]
    }

    #[test]
    fn test_round_trip() {
        let log = ChangeLog::new("h1", sample_changes());
        assert_eq!(log.site_seq, 4);

        let decoded = decode(&encode(&log).unwrap()).unwrap();
        assert_eq!(decoded, log);
    }

    #[test]
    fn test_round_trip_empty_log() {
        let log = ChangeLog::new("h1", Vec::new()).with_site_seq(12);
        let decoded = decode(&encode(&log).unwrap()).unwrap();
        assert_eq!(decoded.host_id, "h1");
        assert_eq!(decoded.site_seq, 12);
        assert!(decoded.changes.is_empty());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let log = ChangeLog::new("h1", sample_changes());
        assert_eq!(encode(&log).unwrap(), encode(&log).unwrap());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        for blob in [
            &b""[..],
            &b"not json at all\n"[..],
            &b"\xff\xfe\x00"[..],
            &b"{\"format\":1}"[..],
        ] {
            let err = decode(blob).unwrap_err();
            assert!(matches!(err, SyncError::CorruptChangeLog { .. }), "{err}");
        }
    }

    #[test]
    fn test_truncated_body_is_corrupt() {
        let blob = encode(&ChangeLog::new("h1", sample_changes())).unwrap();
        let truncated = &blob[..blob.len() - 20];
        let err = decode(truncated).unwrap_err();
        assert!(matches!(
            err,
            SyncError::CorruptChangeLog { host: Some(ref h), .. } if h == "h1"
        ));
    }

    #[test]
    fn test_count_mismatch_is_corrupt() {
        let blob = encode(&ChangeLog::new("h1", sample_changes())).unwrap();
        let text = String::from_utf8(blob).unwrap();
        let tampered = text.replacen("\"count\":3", "\"count\":2", 1);
        let err = decode(tampered.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("declares 2 records"), "{err}");
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let blob = encode(&ChangeLog::new("h1", sample_changes())).unwrap();
        let text = String::from_utf8(blob).unwrap();
        let tampered = text.replacen("\"version\":1,\"host\"", "\"version\":9,\"host\"", 1);
        let err = decode(tampered.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 9"), "{err}");
    }

    #[test]
    fn test_out_of_range_counters_are_corrupt() {
        let cases: [fn(&mut ChangeRecord); 4] = [
            |c| c.version = i64::MAX,
            |c| c.causal_length = 0,
            |c| c.seq = -1,
            |c| c.row_id = i64::MAX,
        ];
        for tamper in cases {
            let mut changes = sample_changes();
            tamper(&mut changes[1]);
            let blob = encode(&ChangeLog::new("h1", changes).with_site_seq(4)).unwrap();
            let err = decode(&blob).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }
    }
}
