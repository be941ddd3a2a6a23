//! The accumulation buffer that hides transport fragmentation.
//!
//! A [`Cumulation`] starts empty, adopts the first fragment without copying, and only
//! combines fragments once a second one arrives while unread bytes remain. How they are
//! combined is chosen per instance with [`Cumulator`]. Once every byte has been read the
//! storage is released and the next fragment is adopted again.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

/// Strategy for combining a new fragment with unread bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cumulator {
    /// Copy into one contiguous, growable buffer.
    #[default]
    Merge,
    /// Keep each fragment as its own region of a chain, without copying.
    Composite,
}

/// Unread bytes received from the transport, readable through [`Buf`].
#[derive(Debug, Default)]
pub struct Cumulation {
    cumulator: Cumulator,
    repr: Repr,
}

#[derive(Debug, Default)]
enum Repr {
    #[default]
    Empty,
    Adopted(Bytes),
    Merged(BytesMut),
    Chain {
        parts: VecDeque<Bytes>,
        len: usize,
    },
}

impl Cumulation {
    pub fn new(cumulator: Cumulator) -> Self {
        Self { cumulator, repr: Repr::Empty }
    }

    pub fn cumulator(&self) -> Cumulator {
        self.cumulator
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Appends a fragment behind the unread bytes.
    pub fn push(&mut self, fragment: Bytes) {
        if fragment.is_empty() {
            return;
        }

        let fragment_len = fragment.len();
        self.repr = match (std::mem::take(&mut self.repr), self.cumulator) {
            (Repr::Empty, _) => Repr::Adopted(fragment),
            (Repr::Adopted(first), Cumulator::Merge) => {
                let mut merged = into_mut(first, fragment_len);
                merged.extend_from_slice(&fragment);
                Repr::Merged(merged)
            }
            (Repr::Adopted(first), Cumulator::Composite) => {
                Repr::Chain { len: first.len() + fragment_len, parts: VecDeque::from([first, fragment]) }
            }
            (Repr::Merged(mut merged), _) => {
                merged.extend_from_slice(&fragment);
                Repr::Merged(merged)
            }
            (Repr::Chain { mut parts, len }, _) => {
                parts.push_back(fragment);
                Repr::Chain { parts, len: len + fragment_len }
            }
        };
    }

    /// Position of the first `byte` at or after `from`, relative to the read position.
    pub fn find_byte(&self, byte: u8, from: usize) -> Option<usize> {
        match &self.repr {
            Repr::Empty => None,
            Repr::Adopted(bytes) => find_in(bytes, byte, from),
            Repr::Merged(bytes) => find_in(bytes, byte, from),
            Repr::Chain { parts, .. } => {
                let mut offset = 0;
                for part in parts {
                    let end = offset + part.len();
                    if from < end {
                        if let Some(index) = find_in(part, byte, from.saturating_sub(offset)) {
                            return Some(offset + index);
                        }
                    }
                    offset = end;
                }
                None
            }
        }
    }

    /// The byte at `index` relative to the read position.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        match &self.repr {
            Repr::Empty => None,
            Repr::Adopted(bytes) => bytes.get(index).copied(),
            Repr::Merged(bytes) => bytes.get(index).copied(),
            Repr::Chain { parts, .. } => {
                let mut index = index;
                for part in parts {
                    if index < part.len() {
                        return Some(part[index]);
                    }
                    index -= part.len();
                }
                None
            }
        }
    }

    /// Takes every unread byte.
    pub fn take_all(&mut self) -> Bytes {
        let len = self.remaining();
        self.copy_to_bytes(len)
    }

    pub fn clear(&mut self) {
        self.repr = Repr::Empty;
    }

    /// Releases the storage once everything has been read.
    fn release_if_drained(&mut self) {
        let drained = match &self.repr {
            Repr::Empty => false,
            Repr::Adopted(bytes) => bytes.is_empty(),
            Repr::Merged(bytes) => bytes.is_empty(),
            Repr::Chain { len, .. } => *len == 0,
        };
        if drained {
            self.repr = Repr::Empty;
        }
    }
}

impl Buf for Cumulation {
    fn remaining(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::Adopted(bytes) => bytes.len(),
            Repr::Merged(bytes) => bytes.len(),
            Repr::Chain { len, .. } => *len,
        }
    }

    fn chunk(&self) -> &[u8] {
        match &self.repr {
            Repr::Empty => &[],
            Repr::Adopted(bytes) => &bytes[..],
            Repr::Merged(bytes) => &bytes[..],
            Repr::Chain { parts, .. } => parts.front().map_or(&[][..], |part| &part[..]),
        }
    }

    fn advance(&mut self, cnt: usize) {
        debug_assert!(cnt <= self.remaining(), "advance past the end of the cumulation");
        match &mut self.repr {
            Repr::Empty => {}
            Repr::Adopted(bytes) => bytes.advance(cnt.min(bytes.len())),
            Repr::Merged(bytes) => bytes.advance(cnt.min(bytes.len())),
            Repr::Chain { parts, len } => {
                let mut cnt = cnt.min(*len);
                *len -= cnt;
                while cnt > 0 {
                    let Some(front) = parts.front_mut() else {
                        break;
                    };
                    if cnt < front.len() {
                        front.advance(cnt);
                        break;
                    }
                    cnt -= front.len();
                    parts.pop_front();
                }
            }
        }
        self.release_if_drained();
    }

    /// Splits off the first `len` bytes, sharing storage whenever they are contiguous.
    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        debug_assert!(len <= self.remaining(), "copy past the end of the cumulation");
        let bytes = match &mut self.repr {
            Repr::Empty => Bytes::new(),
            Repr::Adopted(bytes) => bytes.split_to(len.min(bytes.len())),
            Repr::Merged(bytes) => bytes.split_to(len.min(bytes.len())).freeze(),
            Repr::Chain { parts, len: total } => {
                let len = len.min(*total);
                *total -= len;
                match parts.front_mut() {
                    Some(front) if front.len() >= len => {
                        let bytes = front.split_to(len);
                        if front.is_empty() {
                            parts.pop_front();
                        }
                        bytes
                    }
                    _ => {
                        let mut gathered = BytesMut::with_capacity(len);
                        while gathered.len() < len {
                            let Some(front) = parts.front_mut() else {
                                break;
                            };
                            let take = (len - gathered.len()).min(front.len());
                            gathered.extend_from_slice(&front.split_to(take));
                            if front.is_empty() {
                                parts.pop_front();
                            }
                        }
                        gathered.freeze()
                    }
                }
            }
        };
        self.release_if_drained();
        bytes
    }
}

/// Turns an adopted fragment into a growable buffer, reusing its allocation when no one
/// else holds it.
fn into_mut(bytes: Bytes, additional: usize) -> BytesMut {
    match bytes.try_into_mut() {
        Ok(mut owned) => {
            owned.reserve(additional);
            owned
        }
        Err(shared) => {
            let mut copied = BytesMut::with_capacity(shared.len() + additional);
            copied.extend_from_slice(&shared);
            copied
        }
    }
}

#[inline]
fn find_in(bytes: &[u8], byte: u8, from: usize) -> Option<usize> {
    bytes.get(from..)?.iter().position(|b| *b == byte).map(|index| from + index)
}
