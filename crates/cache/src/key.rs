use std::fmt;

use sha2::{Digest, Sha256};

/// Everything that determines a pipeline output, gathered for keying.
#[derive(Debug)]
pub struct KeyMaterial<'a> {
    /// Target model name.
    pub model: &'a str,
    /// Tokenizer version tag for that model.
    pub tokenizer_version: &'a str,
    /// Fingerprints of the canonicalized input blocks. Hashed in sorted
    /// order so message identity, not accidental ordering of equal content,
    /// decides the key.
    pub fingerprints: Vec<&'a str>,
    /// Canonical rendering of the output-affecting configuration options.
    pub config_fingerprint: &'a str,
}

/// A cache key: hex digest over the key material.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Digest the material into a key.
    pub fn digest(material: KeyMaterial<'_>) -> Self {
        let mut fingerprints = material.fingerprints;
        fingerprints.sort_unstable();

        let mut hasher = Sha256::new();

        // Length-prefix each field so concatenation ambiguity cannot
        // produce colliding keys.
        for field in [material.model, material.tokenizer_version, material.config_fingerprint] {
            hasher.update(field.len().to_le_bytes());
            hasher.update(field.as_bytes());
        }

        for fingerprint in fingerprints {
            hasher.update(fingerprint.len().to_le_bytes());
            hasher.update(fingerprint.as_bytes());
        }

        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
