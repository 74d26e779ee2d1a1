//! Stable content identity for idempotent report lookup.
//!
//! The fingerprint is a SHA-256 hex digest of the exact submitted bytes. It is
//! independent of the guidelines and of the evaluation outcome, so the report
//! store can deduplicate, cache or overwrite by it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hash prefix used in report file names and log fields.
pub const SHORT_HASH_LEN: usize = 8;

/// Compute the content fingerprint (lowercase SHA-256 hex, 64 chars).
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// True if `candidate` has the shape of a fingerprint produced by [`fingerprint`].
pub fn is_fingerprint(candidate: &str) -> bool {
    candidate.len() == 64 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

/// First [`SHORT_HASH_LEN`] characters of a hash.
pub fn short_hash(hash: &str) -> &str {
    let end = hash
        .char_indices()
        .nth(SHORT_HASH_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(hash.len());
    &hash[..end]
}

/// Canonical identifier pairing a content fingerprint with the moment its
/// evaluation was aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId {
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl ReportId {
    pub fn new(content_hash: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content_hash: content_hash.into(),
            timestamp,
        }
    }

    pub fn short_hash(&self) -> &str {
        short_hash(&self.content_hash)
    }

    /// File stem shared by every export of this report:
    /// `report_<YYYYmmdd_HHMMSS>_<hash prefix>`.
    pub fn file_stem(&self) -> String {
        format!(
            "report_{}_{}",
            self.timestamp.format("%Y%m%d_%H%M%S"),
            self.short_hash()
        )
    }

    /// Extract the short hash from a file stem written by [`ReportId::file_stem`].
    pub fn short_hash_from_stem(stem: &str) -> Option<&str> {
        let rest = stem.strip_prefix("report_")?;
        let (_, hash) = rest.rsplit_once('_')?;
        (hash.len() == SHORT_HASH_LEN && hash.chars().all(|c| c.is_ascii_hexdigit()))
            .then_some(hash)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.short_hash(), self.timestamp.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("The quick brown fox");
        let b = fingerprint("The quick brown fox");
        assert_eq!(a, b);
        assert!(is_fingerprint(&a));
    }

    #[test]
    fn fingerprint_distinguishes_near_identical_content() {
        let samples = ["", " ", "  ", "\n", "a", "a ", " a", "A"];
        let hashes: Vec<String> = samples.iter().map(|s| fingerprint(s)).collect();
        for (i, left) in hashes.iter().enumerate() {
            assert_eq!(left, &fingerprint(samples[i]));
            for right in hashes.iter().skip(i + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn fingerprint_of_empty_string_is_known_digest() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_stem_uses_timestamp_and_short_hash() {
        let ts = Utc.with_ymd_and_hms(2025, 7, 18, 15, 56, 20).unwrap();
        let id = ReportId::new(fingerprint("hello"), ts);
        let stem = id.file_stem();
        assert!(stem.starts_with("report_20250718_155620_"));
        assert_eq!(ReportId::short_hash_from_stem(&stem), Some(id.short_hash()));
    }

    #[test]
    fn short_hash_from_stem_rejects_foreign_names() {
        assert_eq!(ReportId::short_hash_from_stem("notes"), None);
        assert_eq!(ReportId::short_hash_from_stem("report_2025_xyz"), None);
    }
}
