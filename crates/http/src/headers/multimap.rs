//! Ordered, multi-valued header storage.
//!
//! Entries live in an index arena. Each entry sits on two lists at once: a singly linked
//! chain per hash bucket for lookups, and a doubly linked list in insertion order for
//! iteration and in-place removal. Both lists always hold exactly the same entries.

use std::fmt;
use std::time::SystemTime;

use super::converter::{ConvertError, TextConverter, ValueConverter};
use super::strategy::{AsciiCaseInsensitive, CaseSensitive, HashingStrategy};

/// Default number of hash buckets, must be a power of two.
const DEFAULT_BUCKETS: usize = 16;

/// Upper bound for the bucket count accepted by [`Headers::with_buckets`].
const MAX_BUCKETS: usize = 1 << 12;

#[derive(Debug, Clone)]
struct HeaderEntry {
    name: String,
    value: String,
    hash: u64,
    /// Next entry in the same bucket, newest first.
    next: Option<usize>,
    /// Previous entry in insertion order.
    before: Option<usize>,
    /// Following entry in insertion order.
    after: Option<usize>,
}

/// A multimap of header names to values.
///
/// - `N` compares and hashes names
/// - `V` compares values
/// - `C` converts values for the typed accessors
///
/// Iteration follows insertion order; lookups are O(1) on average.
#[derive(Clone)]
pub struct Headers<N = AsciiCaseInsensitive, V = CaseSensitive, C = TextConverter> {
    slots: Vec<Option<HeaderEntry>>,
    free: Vec<usize>,
    buckets: Box<[Option<usize>]>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    names: N,
    values: V,
    converter: C,
}

/// HTTP/1.1 headers: case-insensitive names, case-sensitive values, textual conversion.
pub type HttpHeaders = Headers<AsciiCaseInsensitive, CaseSensitive, TextConverter>;

/// Headers whose names are compared byte for byte.
pub type CaseSensitiveHeaders = Headers<CaseSensitive, CaseSensitive, TextConverter>;

impl<N, V, C> Default for Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, V, C> Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates an empty map with roughly `buckets` hash buckets, rounded up to a power of two.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_strategies(buckets, N::default(), V::default(), C::default())
    }

    /// Creates an empty map with explicit strategy instances.
    pub fn with_strategies(buckets: usize, names: N, values: V, converter: C) -> Self {
        let buckets = buckets.clamp(1, MAX_BUCKETS).next_power_of_two();
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: vec![None; buckets].into_boxed_slice(),
            head: None,
            tail: None,
            len: 0,
            names,
            values,
            converter,
        }
    }

    /// Number of entries, counting every value of a repeated name.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an entry, keeping any existing values for `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let hash = self.names.hash(&name);
        let bucket = self.bucket(hash);

        let entry = HeaderEntry { name, value: value.into(), hash, next: self.buckets[bucket], before: self.tail, after: None };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(entry);
                index
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        self.buckets[bucket] = Some(index);
        match self.tail {
            Some(tail) => {
                if let Some(last) = self.entry_mut(tail) {
                    last.after = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        self
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.remove_matching(&name);
        self.add(name, value)
    }

    /// Appends every entry of `other`, in its insertion order.
    pub fn add_all<N2, V2, C2>(&mut self, other: &Headers<N2, V2, C2>) -> &mut Self
    where
        N2: HashingStrategy,
        V2: HashingStrategy,
        C2: ValueConverter,
    {
        for (name, value) in other {
            self.add(name, value);
        }
        self
    }

    /// Replaces the values of every name present in `other` with the values from `other`.
    pub fn set_all<N2, V2, C2>(&mut self, other: &Headers<N2, V2, C2>) -> &mut Self
    where
        N2: HashingStrategy,
        V2: HashingStrategy,
        C2: ValueConverter,
    {
        for name in other.names() {
            self.remove_matching(name);
        }
        self.add_all(other)
    }

    /// Returns the first value of `name` in insertion order.
    pub fn get(&self, name: &str) -> Option<&str> {
        let hash = self.names.hash(name);
        let mut found = None;
        let mut cursor = self.buckets[self.bucket(hash)];
        // the chain is newest first, so the last match is the oldest one
        while let Some(entry) = cursor.and_then(|index| self.entry(index)) {
            if entry.hash == hash && self.names.equals(&entry.name, name) {
                found = Some(entry.value.as_str());
            }
            cursor = entry.next;
        }
        found
    }

    /// Returns every value of `name` in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let hash = self.names.hash(name);
        let mut values = Vec::new();
        let mut cursor = self.buckets[self.bucket(hash)];
        while let Some(entry) = cursor.and_then(|index| self.entry(index)) {
            if entry.hash == hash && self.names.equals(&entry.name, name) {
                values.push(entry.value.as_str());
            }
            cursor = entry.next;
        }
        values.reverse();
        values
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns whether `name` has a value equal to `value` under the value strategy.
    pub fn contains_value(&self, name: &str, value: &str) -> bool {
        self.get_all(name).into_iter().any(|candidate| self.values.equals(candidate, value))
    }

    /// Removes every value of `name`, returning whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        !self.remove_matching(name).is_empty()
    }

    /// Removes every value of `name` and returns the first one.
    pub fn get_and_remove(&mut self, name: &str) -> Option<String> {
        self.remove_matching(name).into_iter().next()
    }

    /// Removes every value of `name` and returns them in insertion order.
    pub fn get_all_and_remove(&mut self, name: &str) -> Vec<String> {
        self.remove_matching(name)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.buckets.fill(None);
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> Iter<'_, N, V, C> {
        Iter { headers: self, cursor: self.head, remaining: self.len }
    }

    /// Distinct names, sorted by the name strategy.
    ///
    /// For names that are equal under the strategy the spelling inserted first wins.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().map(|(name, _)| name).collect();
        names.sort_by(|a, b| self.names.compare(a, b));
        names.dedup_by(|later, earlier| self.names.equals(later, earlier));
        names
    }

    /// The first value of `name` as an integer; `None` when absent or malformed.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.try_get_i64(name).ok().flatten()
    }

    /// Like [`get_i64`](Self::get_i64) but reports malformed values.
    pub fn try_get_i64(&self, name: &str) -> Result<Option<i64>, ConvertError> {
        self.get(name).map(|value| self.converter.parse_i64(value)).transpose()
    }

    pub fn get_i64_or(&self, name: &str, default: i64) -> i64 {
        self.get_i64(name).unwrap_or(default)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|value| i32::try_from(value).ok())
    }

    pub fn try_get_i32(&self, name: &str) -> Result<Option<i32>, ConvertError> {
        match self.try_get_i64(name)? {
            Some(value) => i32::try_from(value).map(Some).map_err(|_| ConvertError::OutOfRange { value }),
            None => Ok(None),
        }
    }

    /// The first value of `name` as a point in time; `None` when absent or malformed.
    pub fn get_timestamp(&self, name: &str) -> Option<SystemTime> {
        self.try_get_timestamp(name).ok().flatten()
    }

    pub fn try_get_timestamp(&self, name: &str) -> Result<Option<SystemTime>, ConvertError> {
        self.get(name).map(|value| self.converter.parse_timestamp(value)).transpose()
    }

    pub fn add_i64(&mut self, name: impl Into<String>, value: i64) -> &mut Self {
        let value = self.converter.format_i64(value);
        self.add(name, value)
    }

    pub fn set_i64(&mut self, name: impl Into<String>, value: i64) -> &mut Self {
        let value = self.converter.format_i64(value);
        self.set(name, value)
    }

    pub fn add_timestamp(&mut self, name: impl Into<String>, value: SystemTime) -> &mut Self {
        let value = self.converter.format_timestamp(value);
        self.add(name, value)
    }

    pub fn set_timestamp(&mut self, name: impl Into<String>, value: SystemTime) -> &mut Self {
        let value = self.converter.format_timestamp(value);
        self.set(name, value)
    }

    #[inline]
    fn bucket(&self, hash: u64) -> usize {
        (hash & (self.buckets.len() as u64 - 1)) as usize
    }

    #[inline]
    fn entry(&self, index: usize) -> Option<&HeaderEntry> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    #[inline]
    fn entry_mut(&mut self, index: usize) -> Option<&mut HeaderEntry> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Unlinks every entry named `name` from both lists, returning the values oldest first.
    fn remove_matching(&mut self, name: &str) -> Vec<String> {
        let hash = self.names.hash(name);
        let bucket = self.bucket(hash);
        let mut removed = Vec::new();

        let mut previous: Option<usize> = None;
        let mut cursor = self.buckets[bucket];
        while let Some(index) = cursor {
            let Some(entry) = self.entry(index) else {
                break;
            };
            let next = entry.next;
            let matched = entry.hash == hash && self.names.equals(&entry.name, name);

            if matched {
                match previous {
                    Some(previous) => {
                        if let Some(entry) = self.entry_mut(previous) {
                            entry.next = next;
                        }
                    }
                    None => self.buckets[bucket] = next,
                }
                if let Some(entry) = self.unlink(index) {
                    removed.push(entry.value);
                }
            } else {
                previous = Some(index);
            }
            cursor = next;
        }

        removed.reverse();
        removed
    }

    /// Takes the entry out of its slot and the insertion list. The bucket chain must
    /// already skip it.
    fn unlink(&mut self, index: usize) -> Option<HeaderEntry> {
        let entry = self.slots.get_mut(index)?.take()?;

        match entry.before {
            Some(before) => {
                if let Some(previous) = self.entry_mut(before) {
                    previous.after = entry.after;
                }
            }
            None => self.head = entry.after,
        }
        match entry.after {
            Some(after) => {
                if let Some(following) = self.entry_mut(after) {
                    following.before = entry.before;
                }
            }
            None => self.tail = entry.before,
        }

        self.free.push(index);
        self.len -= 1;
        Some(entry)
    }
}

/// Insertion-order iterator over a [`Headers`] map.
pub struct Iter<'a, N, V, C> {
    headers: &'a Headers<N, V, C>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<N, V, C> fmt::Debug for Iter<'_, N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("cursor", &self.cursor).field("remaining", &self.remaining).finish_non_exhaustive()
    }
}

impl<'a, N, V, C> Iterator for Iter<'a, N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let headers = self.headers;
        let entry = self.cursor.and_then(|index| headers.entry(index))?;
        self.cursor = entry.after;
        self.remaining = self.remaining.saturating_sub(1);
        Some((entry.name.as_str(), entry.value.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<N, V, C> ExactSizeIterator for Iter<'_, N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
}

impl<'a, N, V, C> IntoIterator for &'a Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a, N, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<N, V, C, K, T> Extend<(K, T)> for Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
    K: Into<String>,
    T: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, T)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}

impl<N, V, C, K, T> FromIterator<(K, T)> for Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
    K: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

/// Two maps are equal when every name carries the same values in the same order;
/// the relative order of different names does not matter.
impl<N, V, C> PartialEq for Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }

        self.names().into_iter().all(|name| {
            let ours = self.get_all(name);
            let theirs = other.get_all(name);
            ours.len() == theirs.len() && ours.iter().zip(&theirs).all(|(a, b)| self.values.equals(a, b))
        })
    }
}

impl<N, V, C> fmt::Debug for Headers<N, V, C>
where
    N: HashingStrategy,
    V: HashingStrategy,
    C: ValueConverter,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn case_insensitive_lookup() {
        let mut headers = HttpHeaders::new();
        headers.add("X-Foo", "1");

        assert_eq!(headers.get("x-foo"), Some("1"));
        assert_eq!(headers.get("X-FOO"), Some("1"));
        assert!(headers.contains("x-Foo"));
        assert!(!headers.contains("x-bar"));
    }

    #[test]
    fn case_sensitive_lookup() {
        let mut headers = CaseSensitiveHeaders::new();
        headers.add("X-Foo", "1");

        assert_eq!(headers.get("X-Foo"), Some("1"));
        assert_eq!(headers.get("x-foo"), None);
    }

    #[test]
    fn add_keeps_duplicates_in_order() {
        let mut headers = HttpHeaders::new();
        headers.add("Accept", "text/html").add("Host", "a").add("accept", "*/*").add("ACCEPT", "image/png");

        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("accept"), Some("text/html"));
        assert_eq!(headers.get_all("Accept"), vec!["text/html", "*/*", "image/png"]);

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("Accept", "text/html"), ("Host", "a"), ("accept", "*/*"), ("ACCEPT", "image/png")]);
    }

    #[test]
    fn set_replaces_all_values() {
        let mut headers = HttpHeaders::new();
        headers.add("Via", "a").add("Host", "h").add("via", "b");
        headers.set("VIA", "c");

        assert_eq!(headers.get_all("via"), vec!["c"]);
        assert_eq!(headers.len(), 2);
        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Host", "VIA"]);
    }

    #[test]
    fn remove_and_reuse_slots() {
        let mut headers = HttpHeaders::new();
        headers.add("A", "1").add("B", "2").add("a", "3").add("C", "4");

        assert!(headers.remove("a"));
        assert!(!headers.remove("a"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("B", "2"), ("C", "4")]);

        headers.add("D", "5");
        headers.add("E", "6");
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("B", "2"), ("C", "4"), ("D", "5"), ("E", "6")]);
        assert_eq!(headers.iter().len(), headers.len());
    }

    #[test]
    fn remove_head_and_tail() {
        let mut headers = HttpHeaders::new();
        headers.add("first", "1").add("middle", "2").add("last", "3");

        assert_eq!(headers.get_and_remove("first"), Some("1".to_string()));
        assert_eq!(headers.get_and_remove("last"), Some("3".to_string()));
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("middle", "2")]);

        headers.add("tail", "4");
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("middle", "2"), ("tail", "4")]);

        assert_eq!(headers.get_all_and_remove("middle"), vec!["2".to_string()]);
        assert_eq!(headers.get_all_and_remove("middle"), Vec::<String>::new());
        headers.clear();
        assert!(headers.is_empty());
        assert_eq!(headers.iter().next(), None);
    }

    #[test]
    fn single_bucket_keeps_chains_consistent() {
        // every name collides, so lookups walk one long chain
        let mut headers = HttpHeaders::with_buckets(1);
        for i in 0..20 {
            headers.add(format!("h{}", i % 5), i.to_string());
        }
        assert!(headers.remove("h2"));
        assert_eq!(headers.len(), 16);
        assert_eq!(headers.get_all("h3"), vec!["3", "8", "13", "18"]);
        assert_eq!(headers.get("h0"), Some("0"));
        assert_eq!(headers.get("h2"), None);
    }

    #[test]
    fn names_are_distinct_and_sorted() {
        let mut headers = HttpHeaders::new();
        headers.add("Host", "a").add("accept", "b").add("Accept", "c").add("Connection", "d");

        assert_eq!(headers.names(), vec!["accept", "Connection", "Host"]);
    }

    #[test]
    fn contains_value_uses_value_strategy() {
        let mut headers = HttpHeaders::new();
        headers.add("Connection", "keep-alive");

        assert!(headers.contains_value("connection", "keep-alive"));
        assert!(!headers.contains_value("connection", "Keep-Alive"));
    }

    #[test]
    fn typed_accessors() {
        let mut headers = HttpHeaders::new();
        headers.set_i64("Content-Length", 42).add("Max-Forwards", "nope");

        assert_eq!(headers.get("content-length"), Some("42"));
        assert_eq!(headers.get_i64("content-length"), Some(42));
        assert_eq!(headers.get_i32("content-length"), Some(42));
        assert_eq!(headers.get_i64("max-forwards"), None);
        assert_eq!(headers.get_i64_or("max-forwards", 7), 7);
        assert_eq!(headers.try_get_i64("missing"), Ok(None));
        assert_eq!(headers.try_get_i64("max-forwards"), Err(ConvertError::invalid_integer("nope")));

        headers.set_i64("Big", i64::from(i32::MAX) + 1);
        assert_eq!(headers.get_i32("big"), None);
        assert_eq!(headers.try_get_i32("big"), Err(ConvertError::OutOfRange { value: i64::from(i32::MAX) + 1 }));

        let time = UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        headers.set_timestamp("Date", time);
        assert_eq!(headers.get("date"), Some("Sun, 09 Sep 2001 01:46:40 GMT"));
        assert_eq!(headers.get_timestamp("date"), Some(time));
    }

    #[test]
    fn injected_converter_changes_wire_form() {
        #[derive(Debug, Clone, Default)]
        struct HexConverter;

        impl ValueConverter for HexConverter {
            fn parse_i64(&self, value: &str) -> Result<i64, ConvertError> {
                i64::from_str_radix(value, 16).map_err(|_| ConvertError::invalid_integer(value))
            }

            fn format_i64(&self, value: i64) -> String {
                format!("{value:x}")
            }

            fn parse_timestamp(&self, value: &str) -> Result<SystemTime, ConvertError> {
                let secs = u64::from_str_radix(value, 16).map_err(|_| ConvertError::invalid_timestamp(value))?;
                Ok(UNIX_EPOCH + Duration::from_secs(secs))
            }

            fn format_timestamp(&self, value: SystemTime) -> String {
                format!("{:x}", value.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
            }
        }

        let mut headers: Headers<AsciiCaseInsensitive, CaseSensitive, HexConverter> = Headers::new();
        headers.set_i64("size", 255);
        assert_eq!(headers.get("size"), Some("ff"));
        assert_eq!(headers.get_i64("SIZE"), Some(255));
    }

    #[test]
    fn equality_ignores_order_between_names() {
        let a: HttpHeaders = [("Host", "a"), ("Accept", "1"), ("Accept", "2")].into_iter().collect();
        let b: HttpHeaders = [("accept", "1"), ("host", "a"), ("ACCEPT", "2")].into_iter().collect();
        let c: HttpHeaders = [("accept", "2"), ("host", "a"), ("ACCEPT", "1")].into_iter().collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn set_all_replaces_overlapping_names() {
        let mut target: HttpHeaders = [("Host", "a"), ("Accept", "1"), ("Accept", "2")].into_iter().collect();
        let source: HttpHeaders = [("accept", "3"), ("Via", "v")].into_iter().collect();

        target.set_all(&source);
        assert_eq!(target.get_all("accept"), vec!["3"]);
        assert_eq!(target.get("via"), Some("v"));
        assert_eq!(target.get("host"), Some("a"));
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn debug_output() {
        let headers: HttpHeaders = [("Host", "a"), ("Accept", "1")].into_iter().collect();
        assert_eq!(format!("{headers:?}"), r#"{"Host": "a", "Accept": "1"}"#);

        let mut iter = headers.iter();
        iter.next();
        assert_eq!(format!("{iter:?}"), "Iter { cursor: Some(1), remaining: 1, .. }");
    }
}
