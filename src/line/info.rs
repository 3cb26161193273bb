// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::Duration;

use crate::errors::{Error, Result};
use crate::fixed_str::FixedStr;
use crate::uapi::{self, v2::LineFlags};

use super::settings::{Bias, Direction, Drive, EdgeDetect, EventClock, LineSettings};
use super::values::MaskedBits;

/// A snapshot of the publicly visible state of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    name: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    consumer: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    offset: u32,
    flags: LineFlags,
    settings: LineSettings,
}

impl LineInfo {
    pub(crate) fn from_v2(info: &uapi::v2::gpio_line_info) -> Result<Self> {
        let name = FixedStr::from_byte_array(info.name)?;
        let consumer = FixedStr::from_byte_array(info.consumer)?;
        let flags = LineFlags::from_bits_retain(info.flags);

        let mut settings = LineSettings::from_flags(flags);
        for attr in info.attrs() {
            match LineAttribute::from_v2(attr)? {
                LineAttribute::Flags(_) | LineAttribute::Values(_) => {}
                LineAttribute::Debounce(us) => {
                    settings = settings.with_debounce_period(Duration::from_micros(us.into()));
                }
            }
        }

        Ok(Self {
            name,
            consumer,
            offset: info.offset,
            flags,
            settings,
        })
    }

    /// The name of this line, as set by the chip driver or device tree.
    pub fn name(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(&self.name)
        }
    }

    /// The label of whoever requested the line.
    ///
    /// May be `None` even for used lines when the user set no label.
    pub fn consumer(&self) -> Option<&str> {
        if self.consumer.is_empty() {
            None
        } else {
            Some(&self.consumer)
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn flags(&self) -> LineFlags {
        self.flags
    }

    /// The current configuration of the line.
    ///
    /// The kernel does not report output values, so the output value is
    /// always [`LineValue::Inactive`](super::LineValue::Inactive).
    pub fn settings(&self) -> &LineSettings {
        &self.settings
    }

    /// True if the line is requested, by this or any other process, or
    /// reserved by the kernel.
    pub fn is_used(&self) -> bool {
        self.flags.contains(LineFlags::USED)
    }

    pub fn direction(&self) -> Direction {
        self.settings.direction()
    }

    pub fn edge_detection(&self) -> EdgeDetect {
        self.settings.edge_detection()
    }

    pub fn bias(&self) -> Bias {
        self.settings.bias()
    }

    pub fn drive(&self) -> Option<Drive> {
        self.settings.drive()
    }

    pub fn is_active_low(&self) -> bool {
        self.settings.is_active_low()
    }

    pub fn debounce_period(&self) -> Duration {
        self.settings.debounce_period()
    }

    pub fn event_clock(&self) -> EventClock {
        self.settings.event_clock()
    }
}

/// A decoded `gpio_v2_line_attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineAttribute {
    Flags(LineFlags),
    Values(MaskedBits),
    /// The debounce period in microseconds
    Debounce(u32),
}

impl LineAttribute {
    pub(crate) fn from_v2(attr: &uapi::v2::gpio_line_attribute) -> Result<Self> {
        use uapi::v2::LineAttrId;

        // SAFETY: every member of the union is a plain integer
        let res = unsafe {
            match LineAttrId::from_raw(attr.id) {
                Some(LineAttrId::Flags) => {
                    Self::Flags(LineFlags::from_bits_retain(attr.attribute.flags))
                }
                Some(LineAttrId::OutputValues) => Self::Values(MaskedBits {
                    bits: attr.attribute.values,
                    mask: u64::MAX,
                }),
                Some(LineAttrId::Debounce) => Self::Debounce(attr.attribute.debounce_period_us),
                None => {
                    return Err(Error::InvalidData(format!(
                        "invalid gpio line attribute ID: 0x{:X}",
                        attr.id
                    )))
                }
            }
        };
        Ok(res)
    }

    pub(crate) const fn into_v2(self) -> uapi::v2::gpio_line_attribute {
        use uapi::v2::{gpio_line_attribute_union, LineAttrId};

        let (id, attribute) = match self {
            LineAttribute::Flags(flags) => (
                LineAttrId::Flags,
                gpio_line_attribute_union {
                    flags: flags.bits(),
                },
            ),
            LineAttribute::Values(v) => (
                LineAttrId::OutputValues,
                gpio_line_attribute_union { values: v.bits },
            ),
            LineAttribute::Debounce(us) => (
                LineAttrId::Debounce,
                gpio_line_attribute_union {
                    // the kernel reads the whole 8 bytes of the union
                    values: us as u64,
                },
            ),
        };

        uapi::v2::gpio_line_attribute {
            id: id as u32,
            _padding: 0,
            attribute,
        }
    }
}
