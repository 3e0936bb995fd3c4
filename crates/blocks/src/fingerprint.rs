use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Normalize content for fingerprinting: lowercase, whitespace runs collapsed
/// to single spaces, leading/trailing whitespace trimmed.
pub fn normalize(content: &str) -> String {
    content
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable digest of a block's normalized content.
///
/// Two blocks whose contents differ only in case or whitespace share a
/// fingerprint; deduplication and cache keying both depend on that.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of the given content under the normalization rule.
    pub fn of(content: &str) -> Self {
        Self(hex_digest(&normalize(content)))
    }

    /// Digest of the content exactly as written, without normalization.
    ///
    /// Used when deduplication is configured to be byte-exact.
    pub fn exact(content: &str) -> Self {
        Self(hex_digest(content))
    }

    /// The hex digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The full digest is noise in test snapshots.
        write!(f, "Fingerprint({}..)", &self.0[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_case_and_whitespace() {
        assert_eq!(normalize("  Hello   World\n"), "hello world");
        assert_eq!(normalize("hello world"), "hello world");
    }

    #[test]
    fn equal_content_under_normalization_has_equal_fingerprints() {
        assert_eq!(Fingerprint::of("Hello  World"), Fingerprint::of("hello world"));
        assert_ne!(Fingerprint::of("hello world"), Fingerprint::of("hello worlds"));
    }

    #[test]
    fn exact_digest_distinguishes_case() {
        assert_ne!(Fingerprint::exact("Hello"), Fingerprint::exact("hello"));
        assert_eq!(Fingerprint::exact("hello"), Fingerprint::exact("hello"));
    }
}
