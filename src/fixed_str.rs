// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! NUL padded strings stored inline in kernel structures.

use std::ops::Deref;

/// A UTF-8 string stored in a NUL padded `[u8; N]`.
///
/// At most `N - 1` bytes are stored so the array always carries a terminator,
/// matching how the kernel treats its name and label fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedStr<const N: usize> {
    s: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    pub const CAPACITY: usize = N - 1;

    #[inline]
    pub const fn empty() -> Self {
        Self { s: [0; N] }
    }

    /// Copy `s`, failing if it does not fit or contains a NUL byte.
    pub fn new(s: &str) -> Result<Self, FixedStrErr> {
        if s.as_bytes().contains(&0) {
            return Err(FixedStrErr::InteriorNul);
        }
        if s.len() > Self::CAPACITY {
            return Err(FixedStrErr::CapacityOverflow {
                capacity: Self::CAPACITY,
                required: s.len(),
            });
        }
        let mut f = Self::empty();
        f.s[..s.len()].copy_from_slice(s.as_bytes());
        Ok(f)
    }

    /// Copy as much of `s` as fits, cutting on a character boundary.
    ///
    /// Returns the string and whether anything was cut off.
    pub fn truncated(s: &str) -> Result<(Self, bool), FixedStrErr> {
        let mut end = s.len().min(Self::CAPACITY);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Ok((Self::new(&s[..end])?, end < s.len()))
    }

    /// Decode a field filled in by the kernel.
    pub fn from_byte_array(mut bytes: [u8; N]) -> Result<Self, FixedStrErr> {
        let nul = find_nul(&bytes).min(Self::CAPACITY);
        let _ = core::str::from_utf8(&bytes[..nul])?;
        bytes[nul..].fill(0);

        Ok(FixedStr { s: bytes })
    }

    pub const fn into_byte_array(self) -> [u8; N] {
        self.s
    }

    #[inline]
    pub fn len(&self) -> usize {
        find_nul(&self.s)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.s[0] == 0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        let l = self.len();
        let s = &self.s[0..l];
        // SAFETY: every constructor validates the stored bytes as UTF-8
        unsafe { std::str::from_utf8_unchecked(s) }
    }
}

impl<const N: usize> Default for FixedStr<N> {
    #[inline(always)]
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FixedStr").field(&self.as_str()).finish()
    }
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

impl<const N: usize> AsRef<str> for FixedStr<N> {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> Deref for FixedStr<N> {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FixedStrErr {
    #[error(
        "Exceeded fixed string size: required {required} bytes with only {capacity} available"
    )]
    CapacityOverflow { capacity: usize, required: usize },
    #[error("String contains a NUL byte")]
    InteriorNul,
    #[error("UTF8 Error")]
    Utf8(#[from] core::str::Utf8Error),
}

#[inline]
fn find_nul(s: &[u8]) -> usize {
    s.iter().position(|c| *c == 0).unwrap_or(s.len())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty() {
        let s = FixedStr::<8>::empty();
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
        assert_eq!(s.as_str(), "");
    }

    #[test]
    fn new_keeps_terminator() {
        let s = FixedStr::<8>::new("abcdefg").unwrap();
        assert_eq!(s.as_str(), "abcdefg");
        assert_eq!(s.into_byte_array()[7], 0);

        assert_eq!(
            FixedStr::<8>::new("abcdefgh"),
            Err(FixedStrErr::CapacityOverflow {
                capacity: 7,
                required: 8
            })
        );
        assert_eq!(FixedStr::<8>::new("a\0b"), Err(FixedStrErr::InteriorNul));
    }

    #[test]
    fn truncated_on_char_boundary() {
        let (s, cut) = FixedStr::<8>::truncated("abc").unwrap();
        assert_eq!(s.as_str(), "abc");
        assert!(!cut);

        // 'é' is two bytes and would straddle the 7 byte limit
        let (s, cut) = FixedStr::<8>::truncated("abcdefé").unwrap();
        assert_eq!(s.as_str(), "abcdef");
        assert!(cut);
    }

    #[test]
    fn from_kernel_bytes() {
        let mut raw = [0u8; 8];
        raw[..4].copy_from_slice(b"gpio");
        raw[5] = b'x';
        let s = FixedStr::from_byte_array(raw).unwrap();
        assert_eq!(s.as_str(), "gpio");
        assert_eq!(s.into_byte_array()[5], 0);

        let bad = [0xff, 0xfe, 0, 0];
        assert!(matches!(
            FixedStr::from_byte_array(bad),
            Err(FixedStrErr::Utf8(_))
        ));
    }

    #[test]
    fn unterminated_kernel_bytes_are_cut() {
        let s = FixedStr::from_byte_array(*b"abcd").unwrap();
        assert_eq!(s.as_str(), "abc");
    }
}
