// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Line configuration, requests and the events they produce.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use itertools::Itertools;

use crate::errors::{ConfigError, Error, Result};
use crate::fixed_str::FixedStr;
use crate::uapi::{self, v2::GPIO_MAX_NAME_SIZE};

mod config;
mod event;
mod info;
mod info_event;
mod reader;
pub mod set;
pub mod settings;
pub mod values;

pub use crate::uapi::v2::LineFlags;
pub use config::{LineConfig, RequestConfig, DEFAULT_READER_CAPACITY};
pub use event::{EdgeEvent, EdgeEventReader, EdgeEvents, EdgeKind, Timestamp};
pub use info::LineInfo;
pub use info_event::{InfoChangeKind, InfoEvent, InfoEvents, InfoWatcher};
pub use set::{AsLineSet, LineSet};
pub use settings::{Active, Bias, Direction, Drive, EdgeDetect, EventClock, LineSettings};
pub use values::{AsValues, LineValue, LineValues, MaskedBits};

pub(crate) use reader::{set_nonblocking, wait_for_readable};

/// Exclusive control over a set of lines of one chip.
///
/// The lines stay requested until the request is released or dropped.
#[derive(Debug)]
pub struct LineRequest {
    fd: OwnedFd,
    chip_name: FixedStr<GPIO_MAX_NAME_SIZE>,
    offsets: LineSet,
    /// Request indices of lines configured as outputs
    outputs: u64,
    config: uapi::v2::gpio_line_config,
    reader_capacity: usize,
}

impl LineRequest {
    pub(crate) fn new(
        chip_fd: BorrowedFd<'_>,
        chip_name: FixedStr<GPIO_MAX_NAME_SIZE>,
        num_lines: u32,
        offsets: impl AsLineSet,
        config: &LineConfig,
        request: &RequestConfig,
    ) -> Result<Self> {
        let offsets = offsets.as_line_set()?;
        if offsets.is_empty() {
            return Err(ConfigError::NoOffsets.into());
        }
        if let Some(&offset) = offsets.iter().find(|&&offset| offset >= num_lines) {
            return Err(ConfigError::InvalidOffset { offset, num_lines }.into());
        }

        let packed = config.finalize(&offsets)?;

        let mut req = uapi::v2::gpio_line_request::zeroed();
        let (num_lines, lines) = offsets.to_api_v2();
        req.num_lines = num_lines;
        req.offsets = lines;
        req.config = packed.config;
        request.apply(&mut req);

        // SAFETY: req is a fully initialized gpio_v2_line_request
        unsafe { uapi::v2::gpio_get_line(chip_fd.as_raw_fd(), &mut req) }
            .map_err(|errno| Error::from_errno(None, errno))?;

        // SAFETY: the kernel returned a new descriptor we now own
        let fd = unsafe { OwnedFd::from_raw_fd(req.fd) };

        tracing::debug!(
            chip = %chip_name,
            offsets = %offsets.iter().join(","),
            consumer = request.consumer(),
            fd = req.fd,
            "requested lines"
        );

        Ok(Self {
            fd,
            chip_name,
            offsets,
            outputs: packed.outputs,
            config: packed.config,
            reader_capacity: request.reader_capacity(),
        })
    }

    /// The requested offsets, in ascending order.
    pub fn offsets(&self) -> &LineSet {
        &self.offsets
    }

    pub fn num_lines(&self) -> usize {
        self.offsets.len()
    }

    /// Name of the chip the lines belong to.
    pub fn chip_name(&self) -> &str {
        &self.chip_name
    }

    /// The settings currently applied to `offset`.
    pub fn settings(&self, offset: u32) -> Result<LineSettings> {
        if !self.offsets.contains(offset) {
            return Err(Error::InvalidOffset(offset));
        }
        config::decode_config(&self.config, &self.offsets)?
            .into_iter()
            .find_map(|(o, settings)| (o == offset).then_some(settings))
            .ok_or(Error::InvalidOffset(offset))
    }

    /// Read the logical value of every requested line.
    pub fn values(&self) -> Result<LineValues> {
        self.read_masked(self.offsets.mask())
    }

    /// Read the logical values of a subset of the requested lines.
    pub fn values_for(&self, offsets: &[u32]) -> Result<LineValues> {
        let mut mask = 0u64;
        for &offset in offsets {
            let idx = self
                .offsets
                .find_idx(offset)
                .ok_or(Error::InvalidOffset(offset))?;
            mask |= 1 << idx;
        }
        self.read_masked(mask)
    }

    pub fn value(&self, offset: u32) -> Result<LineValue> {
        self.values_for(&[offset])?
            .get(offset)
            .ok_or(Error::InvalidOffset(offset))
    }

    fn read_masked(&self, mask: u64) -> Result<LineValues> {
        let mut data = uapi::v2::gpio_line_values { bits: 0, mask };
        if mask != 0 {
            // SAFETY: data is a valid gpio_v2_line_values
            unsafe { uapi::v2::gpio_line_get_values(self.fd.as_raw_fd(), &mut data) }
                .map_err(|errno| Error::from_errno(None, errno))?;
        }

        Ok(LineValues::new(
            self.offsets.clone(),
            MaskedBits::new(data.bits & mask, mask),
        ))
    }

    /// Set the logical values of output lines in one atomic operation.
    ///
    /// Every line written must be configured as an output.
    pub fn set_values(&self, values: impl AsValues) -> Result<()> {
        let values = values.values(&self.offsets)?;

        let inputs = values.mask() & !self.outputs;
        if inputs != 0 {
            let idx = inputs.trailing_zeros() as usize;
            let offset = self.offsets.get_offset(idx).unwrap_or_default();
            return Err(Error::DirectionMismatch(offset));
        }
        if values.is_empty() {
            return Ok(());
        }

        let mut data = uapi::v2::gpio_line_values {
            bits: values.bits(),
            mask: values.mask(),
        };
        // SAFETY: data is a valid gpio_v2_line_values
        unsafe { uapi::v2::gpio_line_set_values(self.fd.as_raw_fd(), &mut data) }
            .map_err(|errno| Error::from_errno(None, errno))?;

        Ok(())
    }

    pub fn set_value(&self, offset: u32, value: LineValue) -> Result<()> {
        self.set_values([(offset, value)])
    }

    /// Apply new settings to the requested lines without releasing them.
    ///
    /// The configuration may only name offsets that are part of this request.
    pub fn reconfigure(&mut self, config: &LineConfig) -> Result<()> {
        let packed = config.finalize(&self.offsets)?;

        let mut raw = packed.config;
        // SAFETY: raw is a fully initialized gpio_v2_line_config
        unsafe { uapi::v2::gpio_line_set_config(self.fd.as_raw_fd(), &mut raw) }
            .map_err(|errno| Error::from_errno(None, errno))?;

        tracing::debug!(
            chip = %self.chip_name,
            offsets = %self.offsets.iter().join(","),
            num_attrs = packed.config.num_attrs,
            "reconfigured lines"
        );

        self.outputs = packed.outputs;
        self.config = packed.config;
        Ok(())
    }

    /// Release the lines. Equivalent to dropping the request.
    pub fn release(self) {
        drop(self)
    }

    /// A reader for the edge events of this request.
    ///
    /// The reader holds as many events as the request's event buffer, or
    /// [`DEFAULT_READER_CAPACITY`] when none was set.
    pub fn edge_events(&self) -> EdgeEventReader<'_> {
        EdgeEventReader::new(self.fd.as_fd(), self.reader_capacity)
    }

    /// Wait for an edge event to become pending. Returns `false` on timeout.
    pub fn wait_edge_events(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_for_readable(self.fd.as_fd(), timeout)
    }

    /// Make reads from [`edge_events`](Self::edge_events) return immediately
    /// when no event is pending.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        set_nonblocking(self.fd.as_fd(), nonblocking)
    }
}

impl Drop for LineRequest {
    fn drop(&mut self) {
        tracing::debug!(
            chip = %self.chip_name,
            offsets = %self.offsets.iter().join(","),
            "released lines"
        );
    }
}

impl AsFd for LineRequest {
    #[inline(always)]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for LineRequest {
    #[inline(always)]
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
