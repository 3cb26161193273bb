// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use bitflags::bitflags;
use nix::ioctl_readwrite;

use super::GPIO_IOCTL_MAGIC;

pub const GPIO_LINES_MAX: usize = 64;
pub const GPIO_MAX_NAME_SIZE: usize = 32;
pub const GPIO_LINE_NUM_ATTRS_MAX: usize = 10;

/// Largest event buffer the kernel accepts for a request.
pub const GPIO_EVENT_BUFFER_MAX: usize = GPIO_LINES_MAX * 16;

bitflags! {
    /// Line flags
    ///
    /// Maps to kernel [`GPIO_V2_LINE_FLAG_*`] flags.
    ///
    /// [`GPIO_V2_LINE_FLAG_*`]: https://github.com/torvalds/linux/blob/v6.1/include/uapi/linux/gpio.h
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LineFlags: u64 {
        const USED = (1 << 0);
        const ACTIVE_LOW = (1 << 1);
        const INPUT = (1 << 2);
        const OUTPUT = (1 << 3);
        const EDGE_RISING = (1 << 4);
        const EDGE_FALLING = (1 << 5);
        const OPEN_DRAIN = (1 << 6);
        const OPEN_SOURCE = (1 << 7);
        const BIAS_PULL_UP = (1 << 8);
        const BIAS_PULL_DOWN = (1 << 9);
        const BIAS_DISABLED = (1 << 10);
        const EVENT_CLOCK_REALTIME = (1 << 11);
        const EVENT_CLOCK_HTE = (1 << 12);
    }
}

/// Attribute IDs
///
/// Maps to kernel `GPIO_V2_LINE_ATTR_ID_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineAttrId {
    Flags = 1,
    OutputValues = 2,
    Debounce = 3,
}

impl LineAttrId {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Flags),
            2 => Some(Self::OutputValues),
            3 => Some(Self::Debounce),
            _ => None,
        }
    }
}

/// Line Event ID
///
/// Maps to kernel `GPIO_V2_LINE_EVENT_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineEventId {
    RisingEdge = 1,
    FallingEdge = 2,
}

impl LineEventId {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::RisingEdge),
            2 => Some(Self::FallingEdge),
            _ => None,
        }
    }
}

/// Changed Type
///
/// Maps to kernel `GPIO_V2_LINE_CHANGED_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineChangedType {
    Requested = 1,
    Released = 2,
    Config = 3,
}

impl LineChangedType {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Requested),
            2 => Some(Self::Released),
            3 => Some(Self::Config),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct gpio_line_values {
    /// a bitmap containing the value of the lines, set to 1 for active
    /// and 0 for inactive
    pub bits: u64,
    /// a bitmap identifying the lines to get or set, with each bit
    /// number corresponding to the index into gpio_v2_line_request.offsets
    pub mask: u64,
}

/// a configurable attribute of a line
#[derive(Clone, Copy)]
#[repr(C)]
pub struct gpio_line_attribute {
    /// attribute identifier, one of [`LineAttrId`]
    pub id: u32,
    /// reserved for future use and must be zero filled
    pub _padding: u32,
    /// A tagged union when combined with `id`
    pub attribute: gpio_line_attribute_union,
}

impl gpio_line_attribute {
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            _padding: 0,
            attribute: gpio_line_attribute_union { values: 0 },
        }
    }
}

impl core::fmt::Debug for gpio_line_attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SAFETY: every member of the union is a plain integer
        let flags = LineFlags::from_bits_retain(unsafe { self.attribute.flags });
        let value = unsafe {
            match LineAttrId::from_raw(self.id) {
                Some(LineAttrId::Flags) => &flags as &dyn core::fmt::Debug,
                Some(LineAttrId::OutputValues) => &self.attribute.values as &dyn core::fmt::Debug,
                Some(LineAttrId::Debounce) => {
                    &self.attribute.debounce_period_us as &dyn core::fmt::Debug
                }
                None => &"unknown line attribute" as &dyn core::fmt::Debug,
            }
        };
        f.debug_struct("gpio_line_attribute")
            .field("id", &self.id)
            .field("attribute", value)
            .finish()
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub union gpio_line_attribute_union {
    /// if `id` is [`LineAttrId::Flags`], the flags for the GPIO line, with
    /// values from [`LineFlags`]. This overrides the default flags contained
    /// in the [`gpio_line_config`] for the associated line.
    pub flags: u64,
    /// if `id` is [`LineAttrId::OutputValues`], a bitmap containing the values
    /// to which the lines will be set, with each bit number corresponding to
    /// the index into [`gpio_line_request::offsets`]
    pub values: u64,
    /// if `id` is [`LineAttrId::Debounce`], the desired debounce period, in
    /// microseconds
    pub debounce_period_us: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config_attribute {
    pub attr: gpio_line_attribute,
    /// a bitmap identifying the lines to which the attribute applies, with
    /// each bit number corresponding to the index into
    /// [`gpio_line_request::offsets`]
    pub mask: u64,
}

impl gpio_line_config_attribute {
    pub const fn zeroed() -> Self {
        Self {
            attr: gpio_line_attribute::zeroed(),
            mask: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config {
    /// flags for the GPIO lines, applied to every line without an
    /// overriding [`LineAttrId::Flags`] attribute
    pub flags: u64,
    pub num_attrs: u32,
    pub _padding: [u32; 5],
    pub attrs: [gpio_line_config_attribute; GPIO_LINE_NUM_ATTRS_MAX],
}

impl gpio_line_config {
    pub const fn zeroed() -> Self {
        Self {
            flags: 0,
            num_attrs: 0,
            _padding: [0; 5],
            attrs: [gpio_line_config_attribute::zeroed(); GPIO_LINE_NUM_ATTRS_MAX],
        }
    }

    pub fn attrs(&self) -> &[gpio_line_config_attribute] {
        let n = (self.num_attrs as usize).min(GPIO_LINE_NUM_ATTRS_MAX);
        &self.attrs[..n]
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_request {
    pub offsets: [u32; GPIO_LINES_MAX],
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub config: gpio_line_config,
    pub num_lines: u32,
    pub event_buffer_size: u32,
    pub _padding: [u32; 5],
    pub fd: i32,
}

impl gpio_line_request {
    pub const fn zeroed() -> Self {
        Self {
            offsets: [0; GPIO_LINES_MAX],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            config: gpio_line_config::zeroed(),
            num_lines: 0,
            event_buffer_size: 0,
            _padding: [0; 5],
            fd: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info {
    pub name: [u8; GPIO_MAX_NAME_SIZE],
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub offset: u32,
    pub num_attrs: u32,
    pub flags: u64,
    pub attrs: [gpio_line_attribute; GPIO_LINE_NUM_ATTRS_MAX],
    pub _padding: [u32; 4],
}

impl gpio_line_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; GPIO_MAX_NAME_SIZE],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            offset: 0,
            num_attrs: 0,
            flags: 0,
            attrs: [gpio_line_attribute::zeroed(); GPIO_LINE_NUM_ATTRS_MAX],
            _padding: [0; 4],
        }
    }

    pub const fn for_offset(offset: u32) -> Self {
        Self {
            offset,
            ..Self::zeroed()
        }
    }

    pub fn attrs(&self) -> &[gpio_line_attribute] {
        let n = (self.num_attrs as usize).min(GPIO_LINE_NUM_ATTRS_MAX);
        &self.attrs[..n]
    }
}

impl Default for gpio_line_info {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

/// gpio_v2_line_info_changed
///
/// Information about a change in status of a GPIO line
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info_changed {
    pub info: gpio_line_info,
    pub timestamp_ns: u64,
    /// one of [`LineChangedType`]
    pub event_type: u32,
    /* Pad struct to 64-bit boundary and reserve space for future use. */
    pub _padding: [u32; 5],
}

impl gpio_line_info_changed {
    pub const fn zeroed() -> Self {
        Self {
            info: gpio_line_info::zeroed(),
            timestamp_ns: 0,
            event_type: 0,
            _padding: [0; 5],
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_event {
    pub timestamp_ns: u64,
    /// one of [`LineEventId`]
    pub id: u32,
    pub offset: u32,
    pub seqno: u32,
    pub line_seqno: u32,
    /* Space reserved for future use. */
    pub _padding: [u32; 6],
}

impl gpio_line_event {
    #[inline(always)]
    pub const fn zeroed() -> Self {
        Self {
            timestamp_ns: 0,
            id: 0,
            offset: 0,
            seqno: 0,
            line_seqno: 0,
            _padding: [0; 6],
        }
    }
}

impl Default for gpio_line_event {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

/// A fixed-size record the kernel writes to a chip or request file.
///
/// # Safety
///
/// Implementors must be `repr(C)` plain-old-data for which every bit pattern
/// is a valid value.
pub unsafe trait KernelRecord: Copy {
    const NAME: &'static str;

    const SIZE: usize = core::mem::size_of::<Self>();

    /// Decode one record from a slice of exactly [`Self::SIZE`] bytes.
    fn from_bytes(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), Self::SIZE);
        // SAFETY: length checked above and every bit pattern is valid for Self
        unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Self) }
    }
}

unsafe impl KernelRecord for gpio_line_event {
    const NAME: &'static str = "gpio_v2_line_event";
}

unsafe impl KernelRecord for gpio_line_info_changed {
    const NAME: &'static str = "gpio_v2_line_info_changed";
}

/// View a record as the raw bytes the kernel would write.
#[cfg(test)]
pub fn record_bytes<T: KernelRecord>(record: &T) -> &[u8] {
    // SAFETY: KernelRecord types have no implicit padding
    unsafe { core::slice::from_raw_parts(record as *const T as *const u8, T::SIZE) }
}

ioctl_readwrite!(gpio_get_lineinfo, GPIO_IOCTL_MAGIC, 0x05, gpio_line_info);
ioctl_readwrite!(gpio_get_lineinfo_watch, GPIO_IOCTL_MAGIC, 0x06, gpio_line_info);

ioctl_readwrite!(gpio_get_line, GPIO_IOCTL_MAGIC, 0x07, gpio_line_request);

ioctl_readwrite!(gpio_line_set_config, GPIO_IOCTL_MAGIC, 0x0D, gpio_line_config);

ioctl_readwrite!(gpio_line_get_values, GPIO_IOCTL_MAGIC, 0x0E, gpio_line_values);
ioctl_readwrite!(gpio_line_set_values, GPIO_IOCTL_MAGIC, 0x0F, gpio_line_values);

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn struct_sizes() {
        assert_eq!(size_of::<gpio_line_values>(), 16);
        assert_eq!(size_of::<gpio_line_attribute>(), 16);
        assert_eq!(size_of::<gpio_line_config_attribute>(), 24);
        assert_eq!(size_of::<gpio_line_config>(), 272);
        assert_eq!(size_of::<gpio_line_request>(), 592);
        assert_eq!(size_of::<gpio_line_info>(), 256);
        assert_eq!(size_of::<gpio_line_info_changed>(), 288);
        assert_eq!(size_of::<gpio_line_event>(), 48);
    }

    #[test]
    fn event_from_bytes() {
        let event = gpio_line_event {
            timestamp_ns: 1_234_567,
            id: LineEventId::FallingEdge as u32,
            offset: 7,
            seqno: 42,
            line_seqno: 3,
            ..gpio_line_event::zeroed()
        };

        let decoded = gpio_line_event::from_bytes(record_bytes(&event));

        assert_eq!(decoded.timestamp_ns, 1_234_567);
        assert_eq!(LineEventId::from_raw(decoded.id), Some(LineEventId::FallingEdge));
        assert_eq!(decoded.offset, 7);
        assert_eq!(decoded.seqno, 42);
        assert_eq!(decoded.line_seqno, 3);
    }

    #[test]
    fn unknown_ids() {
        assert_eq!(LineAttrId::from_raw(0), None);
        assert_eq!(LineAttrId::from_raw(4), None);
        assert_eq!(LineEventId::from_raw(3), None);
        assert_eq!(LineChangedType::from_raw(0), None);
        assert_eq!(LineChangedType::from_raw(3), Some(LineChangedType::Config));
    }
}
