// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::uapi::v2::{gpio_line_info_changed, LineChangedType};

use super::event::Timestamp;
use super::info::LineInfo;
use super::reader::{RecordBatch, RecordReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoChangeKind {
    /// The line was requested.
    Requested,
    /// The line was released.
    Released,
    /// The configuration of a requested line changed.
    Reconfigured,
}

/// A change in the status of a watched line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoEvent {
    timestamp: Timestamp,
    kind: InfoChangeKind,
    info: LineInfo,
}

impl InfoEvent {
    pub(crate) fn from_v2(event: &gpio_line_info_changed) -> Result<Self> {
        let kind = match LineChangedType::from_raw(event.event_type) {
            Some(LineChangedType::Requested) => InfoChangeKind::Requested,
            Some(LineChangedType::Released) => InfoChangeKind::Released,
            Some(LineChangedType::Config) => InfoChangeKind::Reconfigured,
            None => {
                return Err(Error::InvalidData(format!(
                    "unknown line info change type {} on line {}",
                    event.event_type, event.info.offset
                )))
            }
        };

        Ok(Self {
            timestamp: Timestamp::from_nanos(event.timestamp_ns),
            kind,
            info: LineInfo::from_v2(&event.info)?,
        })
    }

    /// When the change happened, on the monotonic clock.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn kind(&self) -> InfoChangeKind {
        self.kind
    }

    /// The line's state after the change.
    pub fn info(&self) -> &LineInfo {
        &self.info
    }

    pub fn into_info(self) -> LineInfo {
        self.info
    }
}

/// Reads line info changes from a chip.
///
/// Only lines registered with [`Chip::watch_line_info`] report changes.
/// As with edge events, only one watcher should read a chip at a time.
///
/// [`Chip::watch_line_info`]: crate::Chip::watch_line_info
#[derive(Debug)]
pub struct InfoWatcher<'a> {
    records: RecordReader<'a, gpio_line_info_changed>,
}

impl<'a> InfoWatcher<'a> {
    pub(crate) fn new(fd: BorrowedFd<'a>, capacity: usize) -> Self {
        Self {
            records: RecordReader::new(fd, capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Read up to `max_events` pending changes in one system call.
    pub fn read(&mut self, max_events: usize) -> Result<InfoEvents<'_>> {
        let records = self.records.fill(max_events)?;
        Ok(InfoEvents { records })
    }

    /// Read a single change, failing with [`Error::WouldBlock`] if the chip
    /// is non-blocking and nothing is pending.
    pub fn read_event(&mut self) -> Result<InfoEvent> {
        let mut records = self.records.fill(1)?.ok_or(Error::WouldBlock)?;
        let record = records.next().ok_or(Error::WouldBlock)?;
        InfoEvent::from_v2(&record)
    }

    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        self.records.wait(timeout)
    }
}

/// The changes returned by one [`InfoWatcher::read`].
#[derive(Debug)]
pub struct InfoEvents<'r> {
    records: Option<RecordBatch<'r, gpio_line_info_changed>>,
}

impl Iterator for InfoEvents<'_> {
    type Item = Result<InfoEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.as_mut()?.next()?;
        Some(InfoEvent::from_v2(&record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records
            .as_ref()
            .map_or((0, Some(0)), |records| records.size_hint())
    }
}

impl ExactSizeIterator for InfoEvents<'_> {}
