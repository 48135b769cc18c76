//! Artifact version keys.
//!
//! Every uploaded archive is stored under `<unix-seconds>-<digest>.<ext>`.
//! The packed string only exists at the storage boundary: [`ArtifactKey::parse`]
//! turns it into a record and `Display` turns it back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Extension used for every archive the packager produces.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Number of digest characters shown in short listings.
pub const SHORT_DIGEST_LEN: usize = 12;

/// Lowercase hex fingerprint of a packaged directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn new(hex: impl Into<String>) -> CoreResult<Self> {
        let hex = hex.into();
        if hex.is_empty() || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(CoreError::InvalidDigest(hex));
        }
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the digest, for compact output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(SHORT_DIGEST_LEN)]
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentDigest {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::new(s)
    }
}

/// Parsed form of a stored object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Upload time in unix seconds.
    pub timestamp: i64,
    pub digest: ContentDigest,
    pub extension: String,
}

impl ArtifactKey {
    /// Key for a new archive uploaded at `timestamp`.
    pub fn new(timestamp: i64, digest: ContentDigest) -> Self {
        Self {
            timestamp,
            digest,
            extension: ARCHIVE_EXTENSION.to_string(),
        }
    }

    /// Parse `<timestamp>-<digest>.<ext>`.
    pub fn parse(key: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let (stem, extension) = key
            .rsplit_once('.')
            .ok_or_else(|| invalid("missing extension"))?;
        if extension.is_empty() {
            return Err(invalid("missing extension"));
        }

        let (timestamp, digest) = stem
            .split_once('-')
            .ok_or_else(|| invalid("expected <timestamp>-<digest>"))?;

        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("timestamp is not a unix time"));
        }
        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| invalid("timestamp out of range"))?;
        let digest = ContentDigest::new(digest).map_err(|_| invalid("digest is not lowercase hex"))?;

        Ok(Self {
            timestamp,
            digest,
            extension: extension.to_string(),
        })
    }

    /// Sort key: upload time first, digest as tie-breaker.
    pub fn order_key(&self) -> (i64, &str) {
        (self.timestamp, self.digest.as_str())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.timestamp, self.digest, self.extension)
    }
}

impl FromStr for ArtifactKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(s: &str) -> ContentDigest {
        ContentDigest::new(s).unwrap()
    }

    #[test]
    fn test_parse_key() {
        let key = ArtifactKey::parse("1700000000-abc123.zip").unwrap();
        assert_eq!(key.timestamp, 1_700_000_000);
        assert_eq!(key.digest.as_str(), "abc123");
        assert_eq!(key.extension, "zip");
    }

    #[test]
    fn test_format_matches_wire_layout() {
        let key = ArtifactKey::new(1800, digest("abc999"));
        assert_eq!(key.to_string(), "1800-abc999.zip");
        assert_eq!(ArtifactKey::parse(&key.to_string()).unwrap(), key);
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for bad in [
            "abc123.zip",
            "1700-abc123",
            "1700-.zip",
            "-abc123.zip",
            "17x0-abc123.zip",
            "1700-ABC123.zip",
            "1700-abc-123.zip",
            "1700-abc123.",
        ] {
            assert!(ArtifactKey::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_short_digest() {
        let d = digest("0123456789abcdef0123");
        assert_eq!(d.short(), "0123456789ab");
        assert_eq!(digest("abc").short(), "abc");
    }

    #[test]
    fn test_digest_rejects_uppercase() {
        assert!(ContentDigest::new("ABCDEF").is_err());
        assert!(ContentDigest::new("").is_err());
    }
}
