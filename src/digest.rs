//! Content fingerprints.
//!
//! A [`Digest`] is the lowercase hex SHA-256 of a byte sequence. Comparing two
//! digests stands in for comparing full file contents everywhere in the
//! protocol, so a client can say "I already have this" without resending bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 of some content.
///
/// The default value is the empty string, which never equals the digest of
/// any real content (including the empty file). It marks "no file".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of `content`.
    pub fn of(content: &[u8]) -> Self {
        Self(compute_content_hash(content))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the placeholder digest of a missing file.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 hash of content as a hex string.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
