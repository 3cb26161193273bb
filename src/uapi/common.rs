// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use nix::{ioctl_read, ioctl_readwrite};

pub const GPIO_IOCTL_MAGIC: u8 = 0xB4;

/// struct gpiochip_info
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_chip_info {
    pub name: [u8; super::v2::GPIO_MAX_NAME_SIZE],
    pub label: [u8; super::v2::GPIO_MAX_NAME_SIZE],
    pub lines: u32,
}

impl gpio_chip_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; super::v2::GPIO_MAX_NAME_SIZE],
            label: [0; super::v2::GPIO_MAX_NAME_SIZE],
            lines: 0,
        }
    }
}

ioctl_read!(gpio_get_chipinfo, GPIO_IOCTL_MAGIC, 0x01, gpio_chip_info);

ioctl_readwrite!(gpio_get_lineinfo_unwatch, GPIO_IOCTL_MAGIC, 0x0C, u32);
