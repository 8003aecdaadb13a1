//! Deterministic SHA-256 fingerprints for cache keys.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` as lowercase hex.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Incremental fingerprint over a sequence of parts.
///
/// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` never
/// collide. The domain tag keeps fingerprints from different caches apart.
///
/// # Example
///
/// ```
/// use tempera_cache::Fingerprint;
///
/// let a = Fingerprint::new("resize").part(b"pixels").part("1024x1024").finish();
/// let b = Fingerprint::new("resize").part(b"pixels").part("1024x1024").finish();
/// let c = Fingerprint::new("resize").part(b"pixels").part("512x512").finish();
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(Debug, Clone)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Start a fingerprint in the given domain.
    pub fn new(domain: &str) -> Self {
        let fingerprint = Self {
            hasher: Sha256::new(),
        };
        fingerprint.part(domain)
    }

    /// Feed one part.
    pub fn part(mut self, part: impl AsRef<[u8]>) -> Self {
        let part = part.as_ref();
        self.hasher.update((part.len() as u64).to_le_bytes());
        self.hasher.update(part);
        self
    }

    /// Finish and return lowercase hex.
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}
