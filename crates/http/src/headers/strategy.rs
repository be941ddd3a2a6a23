//! Equality, hashing and ordering strategies for header names and values.
//!
//! A [`Headers`](super::Headers) map is parameterized by one strategy for names and one
//! for values, so the same container serves both the case-insensitive HTTP/1.1 headers
//! and case-sensitive variants without duplicating the storage code.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::{DefaultHasher, Hasher};

/// Decides when two header strings are the same and how they hash and sort.
///
/// Implementations must keep `hash` consistent with `equals`: two strings that are
/// equal under the strategy must produce the same hash.
pub trait HashingStrategy: Clone + Default + Debug {
    /// Hashes `value` so that equal strings land in the same bucket.
    fn hash(&self, value: &str) -> u64;

    /// Returns whether `a` and `b` are the same under this strategy.
    fn equals(&self, a: &str, b: &str) -> bool;

    /// Orders `a` relative to `b`, consistent with [`equals`](Self::equals).
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// ASCII case-insensitive strategy, the default for HTTP header names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsciiCaseInsensitive;

impl HashingStrategy for AsciiCaseInsensitive {
    fn hash(&self, value: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        for b in value.bytes() {
            hasher.write_u8(b.to_ascii_lowercase());
        }
        hasher.finish()
    }

    #[inline]
    fn equals(&self, a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let lhs = a.bytes().map(|b| b.to_ascii_lowercase());
        let rhs = b.bytes().map(|b| b.to_ascii_lowercase());
        lhs.cmp(rhs)
    }
}

/// Byte-exact strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaseSensitive;

impl HashingStrategy for CaseSensitive {
    fn hash(&self, value: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        hasher.write(value.as_bytes());
        hasher.finish()
    }

    #[inline]
    fn equals(&self, a: &str, b: &str) -> bool {
        a == b
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}
