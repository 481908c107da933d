//! ByteView
//!
//! A borrowed, non-owning view over a byte range. Used as key and value
//! type across the file and cache APIs. The lifetime ties the view to its
//! referent, so a view can never outlive the bytes it points at.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, Index};

/// Borrowed view over a run of bytes
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Create an empty view
    pub const fn empty() -> Self {
        Self { data: &[] }
    }

    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reset to the empty view
    pub fn clear(&mut self) {
        self.data = &[];
    }

    /// Drop the first `n` bytes from the view.
    ///
    /// REQUIRES: `n <= self.len()`
    pub fn remove_prefix(&mut self, n: usize) {
        debug_assert!(n <= self.len(), "remove_prefix({}) on view of {}", n, self.len());
        self.data = &self.data[n.min(self.data.len())..];
    }

    pub fn starts_with(&self, prefix: impl AsRef<[u8]>) -> bool {
        self.data.starts_with(prefix.as_ref())
    }

    /// Three-way lexicographic comparison; a strict prefix sorts first
    pub fn compare(&self, other: &ByteView<'_>) -> Ordering {
        self.data.cmp(other.data)
    }

    /// Copy the viewed bytes into an owned buffer
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Deref for ByteView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl AsRef<[u8]> for ByteView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl Index<usize> for ByteView<'_> {
    type Output = u8;

    fn index(&self, n: usize) -> &u8 {
        &self.data[n]
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteView<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self { data: &data[..] }
    }
}

impl<'a> From<&'a str> for ByteView<'a> {
    fn from(s: &'a str) -> Self {
        Self { data: s.as_bytes() }
    }
}

impl<'a> From<&'a Vec<u8>> for ByteView<'a> {
    fn from(v: &'a Vec<u8>) -> Self {
        Self { data: v.as_slice() }
    }
}

impl<'a> From<&'a String> for ByteView<'a> {
    fn from(s: &'a String) -> Self {
        Self { data: s.as_bytes() }
    }
}

impl fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({:?})", String::from_utf8_lossy(self.data))
    }
}
