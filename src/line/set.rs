// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::errors::ConfigError;
use crate::uapi::v2::GPIO_LINES_MAX;

/// Anything that names a set of line offsets.
pub trait AsLineSet {
    fn as_line_set(&self) -> Result<LineSet, ConfigError>;
}

impl AsLineSet for u32 {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        LineSet::try_from_iter([*self])
    }
}

impl AsLineSet for [u32] {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        LineSet::try_from_iter(self.iter().copied())
    }
}

impl<const M: usize> AsLineSet for [u32; M] {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        LineSet::try_from_iter(*self)
    }
}

impl AsLineSet for Vec<u32> {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        LineSet::try_from_iter(self.iter().copied())
    }
}

impl AsLineSet for std::ops::Range<u32> {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        LineSet::try_from_iter(self.clone())
    }
}

impl AsLineSet for LineSet {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        Ok(self.clone())
    }
}

impl<T: AsLineSet + ?Sized> AsLineSet for &T {
    fn as_line_set(&self) -> Result<LineSet, ConfigError> {
        (**self).as_line_set()
    }
}

/// A sorted set of distinct line offsets, at most [`GPIO_LINES_MAX`] long.
///
/// The position of an offset in the set is the index the kernel uses for
/// that line in value and attribute bitmaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineSet(heapless::Vec<u32, GPIO_LINES_MAX>);

impl LineSet {
    pub const fn empty() -> Self {
        LineSet(heapless::Vec::new())
    }

    /// Collect offsets into a set.
    ///
    /// Fails on a repeated offset or if there are more than
    /// [`GPIO_LINES_MAX`] offsets.
    pub fn try_from_iter(iter: impl IntoIterator<Item = u32>) -> Result<Self, ConfigError> {
        let mut iter = iter.into_iter();
        let mut vec: heapless::Vec<_, GPIO_LINES_MAX> =
            iter.by_ref().take(GPIO_LINES_MAX).collect();

        let extra = iter.count();
        if extra > 0 {
            return Err(ConfigError::TooManyLines {
                requested: GPIO_LINES_MAX + extra,
                max: GPIO_LINES_MAX,
            });
        }

        vec.sort_unstable();
        if let Some(pair) = vec.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::DuplicateOffset(pair[0]));
        }

        Ok(Self(vec))
    }

    pub fn add_offset(&mut self, offset: u32) -> Result<(), ConfigError> {
        match self.0.binary_search(&offset) {
            Ok(_) => Err(ConfigError::DuplicateOffset(offset)),
            Err(idx) => self.0.insert(idx, offset).map_err(|_| ConfigError::TooManyLines {
                requested: GPIO_LINES_MAX + 1,
                max: GPIO_LINES_MAX,
            }),
        }
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.find_idx(offset).is_some()
    }

    /// The request-local index of `offset`.
    pub fn find_idx(&self, offset: u32) -> Option<usize> {
        self.0.binary_search(&offset).ok()
    }

    pub fn get_offset(&self, idx: usize) -> Option<u32> {
        self.0.get(idx).copied()
    }

    /// Bitmap covering every line in the set.
    pub(crate) fn mask(&self) -> u64 {
        1u64.checked_shl(self.len() as u32)
            .map(|v| v - 1)
            .unwrap_or(u64::MAX)
    }

    pub(crate) fn to_api_v2(&self) -> (u32, [u32; GPIO_LINES_MAX]) {
        let len = self.0.len() as u32;
        let mut lines = [0; GPIO_LINES_MAX];
        for (offset, wr) in self.0.iter().zip(lines.iter_mut()) {
            *wr = *offset;
        }
        (len, lines)
    }
}

impl std::ops::Deref for LineSet {
    type Target = [u32];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sorted_with_indices() {
        let set = LineSet::try_from_iter([7, 1, 4]).unwrap();
        assert_eq!(&*set, &[1, 4, 7]);
        assert_eq!(set.find_idx(4), Some(1));
        assert_eq!(set.find_idx(5), None);
        assert_eq!(set.get_offset(2), Some(7));
        assert_eq!(set.mask(), 0b111);
    }

    #[test]
    fn duplicates_rejected() {
        assert_eq!(
            [3, 1, 3].as_line_set(),
            Err(ConfigError::DuplicateOffset(3))
        );

        let mut set = LineSet::try_from_iter([1]).unwrap();
        assert_eq!(set.add_offset(1), Err(ConfigError::DuplicateOffset(1)));
        set.add_offset(0).unwrap();
        assert_eq!(&*set, &[0, 1]);
    }

    #[test]
    fn capacity() {
        let full = (0..64).as_line_set().unwrap();
        assert_eq!(full.len(), 64);
        assert_eq!(full.mask(), u64::MAX);

        assert_eq!(
            (0..66).as_line_set(),
            Err(ConfigError::TooManyLines {
                requested: 66,
                max: 64
            })
        );

        let mut full = full;
        assert!(full.add_offset(100).is_err());
    }

    #[test]
    fn api_layout() {
        let set = LineSet::try_from_iter([9, 2]).unwrap();
        let (n, lines) = set.to_api_v2();
        assert_eq!(n, 2);
        assert_eq!(&lines[..3], &[2, 9, 0]);
    }
}
