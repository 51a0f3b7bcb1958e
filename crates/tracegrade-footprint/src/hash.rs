//! Stable structural hashing of observed values.
//!
//! The footprint deduplicates values by content, so the hash must be stable
//! across runs and processes. Values are walked structurally and every
//! variant tag, length prefix and `f64` bit pattern is fed into BLAKE3.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-byte BLAKE3 digest identifying a value by content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the BLAKE3 hash of arbitrary data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hex-encode for display.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental structural hasher.
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Feed a one-byte variant tag.
    pub fn tag(&mut self, tag: u8) -> &mut Self {
        self.inner.update(&[tag]);
        self
    }

    /// Feed a length prefix so that adjacent sequences cannot alias.
    pub fn length(&mut self, len: usize) -> &mut Self {
        self.inner.update(&(len as u64).to_le_bytes());
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.inner.update(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.inner.update(&v.to_le_bytes());
        self
    }

    /// Floats hash by bit pattern; all NaNs collapse to one canonical NaN.
    pub fn f64(&mut self, v: f64) -> &mut Self {
        let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
        self.inner.update(&bits.to_le_bytes());
        self
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.length(s.len());
        self.inner.update(s.as_bytes());
        self
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.inner.finalize().as_bytes())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHash::hash(b"abc"), ContentHash::hash(b"abc"));
        assert_ne!(ContentHash::hash(b"abc"), ContentHash::hash(b"abd"));
    }

    #[test]
    fn length_prefix_prevents_aliasing() {
        let a = {
            let mut h = ContentHasher::new();
            h.str("ab").str("c");
            h.finish()
        };
        let b = {
            let mut h = ContentHasher::new();
            h.str("a").str("bc");
            h.finish()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn nan_payloads_collapse() {
        let quiet = f64::NAN;
        let other = f64::from_bits(f64::NAN.to_bits() ^ 1);
        assert!(other.is_nan());
        let mut h1 = ContentHasher::new();
        h1.f64(quiet);
        let mut h2 = ContentHasher::new();
        h2.f64(other);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn hex_display_is_64_chars() {
        let h = ContentHash::hash(b"x");
        assert_eq!(h.to_hex().len(), 64);
        assert!(format!("{:?}", h).starts_with("ContentHash("));
    }
}
