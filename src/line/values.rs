// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::errors::{Error, Result};

use super::set::LineSet;

/// The logical value of a line, with active-low already applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LineValue {
    #[default]
    Inactive,
    Active,
}

impl LineValue {
    pub const fn new(is_active: bool) -> Self {
        if is_active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, LineValue::Active)
    }
}

impl From<bool> for LineValue {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl std::ops::Not for LineValue {
    type Output = Self;

    fn not(self) -> Self {
        Self::new(!self.is_active())
    }
}

/// Something that can be written to the lines of a request.
pub trait AsValues {
    /// Pack the values into bits indexed by position in `lines`.
    ///
    /// Fails with [`Error::InvalidOffset`] for offsets not in `lines`.
    fn values(&self, lines: &LineSet) -> Result<MaskedBits>;
}

/// Drive every line of the request to the same value.
impl AsValues for LineValue {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        let mask = lines.mask();

        let bits = if self.is_active() { mask } else { 0 };

        Ok(MaskedBits { bits, mask })
    }
}

impl AsValues for [(u32, LineValue)] {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        let mut bits = MaskedBits::empty();

        for &(offset, value) in self {
            let idx = lines.find_idx(offset).ok_or(Error::InvalidOffset(offset))?;
            bits.set_bit_value(idx, value.is_active());
        }

        Ok(bits)
    }
}

impl<const N: usize> AsValues for [(u32, LineValue); N] {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        self.as_slice().values(lines)
    }
}

impl AsValues for Vec<(u32, LineValue)> {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        self.as_slice().values(lines)
    }
}

impl AsValues for LineValues {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        if self.offsets == *lines {
            return Ok(self.values);
        }
        let mut bits = MaskedBits::empty();
        for (offset, value) in self.iter() {
            let idx = lines.find_idx(offset).ok_or(Error::InvalidOffset(offset))?;
            bits.set_bit_value(idx, value.is_active());
        }
        Ok(bits)
    }
}

impl<T: AsValues + ?Sized> AsValues for &T {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        (**self).values(lines)
    }
}

/// Line values packed as the kernel expects them: bit `n` is the line at
/// index `n` of the request, and only bits present in `mask` are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskedBits {
    pub(crate) bits: u64,
    pub(crate) mask: u64,
}

impl MaskedBits {
    pub const fn new(bits: u64, mask: u64) -> Self {
        Self { bits, mask }
    }

    pub const fn empty() -> Self {
        MaskedBits { bits: 0, mask: 0 }
    }

    pub const fn bits(&self) -> u64 {
        self.bits & self.mask
    }

    pub const fn mask(&self) -> u64 {
        self.mask
    }

    pub const fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }

    #[inline(always)]
    pub const fn get(&self, bit: usize) -> Option<bool> {
        let bit = 1 << bit;
        if self.mask & bit > 0 {
            Some(self.bits & bit > 0)
        } else {
            None
        }
    }

    #[inline]
    pub fn set_bit_value(&mut self, bit: usize, value: bool) {
        let bit = 1u64 << bit;

        if value {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
        self.mask |= bit;
    }

    /// Iterate over `(index, value)` for every bit in the mask.
    pub fn iter(&self) -> impl Iterator<Item = (usize, bool)> + 'static {
        let mask = self.mask;
        let bits = self.bits;
        (0..64).filter_map(move |idx| {
            let bit = 1u64 << idx;

            if mask & bit > 0 {
                Some((idx, bits & bit > 0))
            } else {
                None
            }
        })
    }
}

/// A snapshot of line values, keyed by offset.
#[derive(Clone, PartialEq, Eq)]
pub struct LineValues {
    pub(crate) offsets: LineSet,
    pub(crate) values: MaskedBits,
}

impl LineValues {
    pub(crate) fn new(offsets: LineSet, values: MaskedBits) -> Self {
        Self { offsets, values }
    }

    /// The value of `offset`, if it is part of this snapshot.
    pub fn get(&self, offset: u32) -> Option<LineValue> {
        let idx = self.offsets.find_idx(offset)?;
        self.values.get(idx).map(LineValue::new)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(offset, value)` in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, LineValue)> + '_ {
        self.offsets
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(idx, offset)| {
                let v = LineValue::new(self.values.get(idx)?);
                Some((offset, v))
            })
    }

    pub fn as_bits(&self) -> MaskedBits {
        self.values
    }
}

impl std::fmt::Debug for LineValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lines() -> LineSet {
        LineSet::try_from_iter([5, 0, 2]).unwrap()
    }

    #[test]
    fn pairs_map_to_request_indices() {
        let bits = [(0, LineValue::Active), (2, LineValue::Inactive), (5, LineValue::Active)]
            .values(&lines())
            .unwrap();

        // sorted offsets [0, 2, 5] -> indices 0, 1, 2
        assert_eq!(bits.mask(), 0b111);
        assert_eq!(bits.bits(), 0b101);
    }

    #[test]
    fn unknown_offset_is_rejected() {
        let err = [(0, LineValue::Active), (3, LineValue::Active)]
            .values(&lines())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOffset(3)));
    }

    #[test]
    fn single_value_covers_all_lines() {
        let bits = LineValue::Active.values(&lines()).unwrap();
        assert_eq!(bits, MaskedBits::new(0b111, 0b111));

        let bits = LineValue::Inactive.values(&lines()).unwrap();
        assert_eq!(bits, MaskedBits::new(0, 0b111));
    }

    #[test]
    fn snapshot_lookup() {
        let values = LineValues::new(lines(), MaskedBits::new(0b100, 0b110));

        assert_eq!(values.len(), 2);
        assert_eq!(values.get(0), None);
        assert_eq!(values.get(2), Some(LineValue::Inactive));
        assert_eq!(values.get(5), Some(LineValue::Active));
        assert_eq!(values.get(7), None);
        assert_eq!(
            values.iter().collect::<Vec<_>>(),
            vec![(2, LineValue::Inactive), (5, LineValue::Active)]
        );
        assert_eq!(format!("{values:?}"), "{2: Inactive, 5: Active}");
    }

    #[test]
    fn snapshot_written_back_to_other_set() {
        let values = LineValues::new(lines(), MaskedBits::new(0b100, 0b110));
        let other = LineSet::try_from_iter([2, 5, 9]).unwrap();

        assert_eq!(values.values(&other).unwrap(), MaskedBits::new(0b010, 0b011));
    }

    #[test]
    fn masked_bits_iter() {
        let mut bits = MaskedBits::empty();
        bits.set_bit_value(3, true);
        bits.set_bit_value(1, false);
        bits.set_bit_value(3, false);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![(1, false), (3, false)]);
    }
}
