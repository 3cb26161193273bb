// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpiod-core` crate provides access to GPIO lines through the Linux
//! [GPIO character device](https://www.kernel.org/doc/html/latest/userspace-api/gpio/chardev.html)
//! (`/dev/gpiochipN`), using version 2 of the uAPI available since Linux 5.10.
//!
//! Lines are configured with [`LineSettings`], collected per offset in a
//! [`LineConfig`], and requested from a [`Chip`] together with a
//! [`RequestConfig`]. The resulting [`LineRequest`] reads and writes values,
//! can be reconfigured in place, and hands out an [`EdgeEventReader`] for edge
//! events. A chip can also report changes to its lines through an
//! [`InfoWatcher`].
//!
//! # Examples
//!
//! Mirror a button onto an LED:
//!
//! ```no_run
//! use gpiod_core::{
//!     Bias, Chip, EdgeDetect, EdgeKind, LineConfig, LineSettings, LineValue, RequestConfig,
//! };
//!
//! const BUTTON: u32 = 17;
//! const LED: u32 = 27;
//!
//! fn main() -> Result<(), gpiod_core::Error> {
//!     let chip = Chip::open("/dev/gpiochip0")?;
//!
//!     let config = LineConfig::new()
//!         .with(
//!             BUTTON,
//!             LineSettings::input()
//!                 .with_bias(Bias::PullUp)
//!                 .with_edge_detection(EdgeDetect::Both),
//!         )?
//!         .with(LED, LineSettings::output(LineValue::Inactive))?;
//!     let request = chip.request_lines(
//!         [BUTTON, LED],
//!         &config,
//!         &RequestConfig::new().with_consumer("mirror")?,
//!     )?;
//!
//!     let mut events = request.edge_events();
//!     loop {
//!         for event in events.read(16)? {
//!             let value = LineValue::from(event?.kind() == EdgeKind::Rising);
//!             request.set_value(LED, value)?;
//!         }
//!     }
//! }
//! ```
//!
//! Print every line of every chip:
//!
//! ```no_run
//! # fn main() -> gpiod_core::Result<()> {
//! for chip in gpiod_core::chips()? {
//!     let chip = chip?;
//!     println!("{} [{}]", chip.name(), chip.label());
//!     for info in chip.lines() {
//!         let info = info?;
//!         println!("  {:>3}: {:?} {:?}", info.offset(), info.name(), info.direction());
//!     }
//! }
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;

pub mod fixed_str;

#[allow(non_camel_case_types)]
pub(crate) mod uapi;

pub mod chip;

pub mod line;

pub use chip::{chips, find_line, is_gpiochip_device, Chip, ChipInfo, ChipIterator};
pub use errors::{ConfigError, Error, Result, SettingsConflict};
pub use line::{
    Active, AsLineSet, AsValues, Bias, Direction, Drive, EdgeDetect, EdgeEvent, EdgeEventReader,
    EdgeEvents, EdgeKind, EventClock, InfoChangeKind, InfoEvent, InfoEvents, InfoWatcher,
    LineConfig, LineFlags, LineInfo, LineRequest, LineSet, LineSettings, LineValue, LineValues,
    RequestConfig, Timestamp,
};
