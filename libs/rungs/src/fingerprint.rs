//! Content fingerprints for candidate pipelines.
//!
//! Two candidates with the same pipeline description share a fingerprint,
//! even when their identities differ. Used to avoid re-evaluating freshly
//! generated duplicates.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// SHA-256 based fingerprint of a pipeline description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a pipeline description.
    pub fn of(description: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(description.trim().as_bytes());
        let digest = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(&digest[..16]))) // first 128 bits
    }

    /// Get the fingerprint string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprints already handed out during one search.
#[derive(Debug, Clone, Default)]
pub struct SeenFingerprints {
    seen: HashSet<Fingerprint>,
}

impl SeenFingerprints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a fingerprint. Returns false if it was already known.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.seen.insert(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Fingerprint::of("LogisticRegression(data, C=1.0)");
        let b = Fingerprint::of("LogisticRegression(data, C=1.0)\n");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("sha256:"));
        assert_eq!(a.as_str().len(), "sha256:".len() + 32);
    }

    #[test]
    fn test_fingerprint_distinguishes_pipelines() {
        assert_ne!(
            Fingerprint::of("GaussianNB(data)"),
            Fingerprint::of("BernoulliNB(data)")
        );
    }

    #[test]
    fn test_seen_fingerprints() {
        let mut seen = SeenFingerprints::new();
        assert!(seen.is_empty());
        assert!(seen.insert(Fingerprint::of("a")));
        assert!(!seen.insert(Fingerprint::of("a")));
        assert!(seen.contains(&Fingerprint::of("a")));
        assert_eq!(seen.len(), 1);
    }
}
