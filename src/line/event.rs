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
use crate::uapi::v2::{gpio_line_event, LineEventId};

use super::reader::{RecordBatch, RecordReader};
use super::settings::EventClock;

/// A kernel timestamp in nanoseconds, on the clock selected for the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Read `clock` now, for comparison with event timestamps.
    ///
    /// Hardware timestamps have no system clock to compare against.
    pub fn now(clock: EventClock) -> Result<Self> {
        let clock_id = match clock {
            EventClock::Monotonic => libc::CLOCK_MONOTONIC,
            EventClock::Realtime => libc::CLOCK_REALTIME,
            EventClock::Hte => {
                return Err(Error::InvalidData(
                    "hardware timestamp engine has no readable clock".into(),
                ))
            }
        };

        let mut ts = std::mem::MaybeUninit::<libc::timespec>::zeroed();
        // SAFETY: ts is valid for writes
        let res = unsafe { libc::clock_gettime(clock_id, ts.as_mut_ptr()) };
        nix::errno::Errno::result(res).map_err(|e| Error::Io(e.into()))?;
        // SAFETY: initialized by clock_gettime
        let ts = unsafe { ts.assume_init() };

        Ok(Self(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64))
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub const fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub const fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Rising,
    Falling,
}

/// An edge detected on a requested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    timestamp: Timestamp,
    kind: EdgeKind,
    offset: u32,
    seqno: u64,
    line_seqno: u64,
}

impl EdgeEvent {
    pub(crate) fn from_v2(event: &gpio_line_event) -> Result<Self> {
        let kind = match LineEventId::from_raw(event.id) {
            Some(LineEventId::RisingEdge) => EdgeKind::Rising,
            Some(LineEventId::FallingEdge) => EdgeKind::Falling,
            None => {
                return Err(Error::InvalidData(format!(
                    "unknown edge event id {} on line {}",
                    event.id, event.offset
                )))
            }
        };

        Ok(Self {
            timestamp: Timestamp(event.timestamp_ns),
            kind,
            offset: event.offset,
            seqno: event.seqno.into(),
            line_seqno: event.line_seqno.into(),
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp.0
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Sequence number of the event among all lines of the request.
    pub fn seqno(&self) -> u64 {
        self.seqno
    }

    /// Sequence number of the event on this line.
    pub fn line_seqno(&self) -> u64 {
        self.line_seqno
    }
}

/// Reads edge events from a line request.
///
/// Events are read in batches into a buffer owned by the reader; a batch
/// borrows the reader and stays valid until the next read. Only one reader
/// should consume a request's events at a time, as each event is delivered
/// once.
#[derive(Debug)]
pub struct EdgeEventReader<'a> {
    records: RecordReader<'a, gpio_line_event>,
}

impl<'a> EdgeEventReader<'a> {
    pub(crate) fn new(fd: BorrowedFd<'a>, capacity: usize) -> Self {
        Self {
            records: RecordReader::new(fd, capacity),
        }
    }

    /// Maximum number of events a single read returns.
    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Read up to `max_events` pending events in one system call.
    ///
    /// Blocks until at least one event is available unless the request is
    /// non-blocking, in which case an empty batch means nothing was pending.
    pub fn read(&mut self, max_events: usize) -> Result<EdgeEvents<'_>> {
        let records = self.records.fill(max_events)?;
        Ok(EdgeEvents { records })
    }

    /// Read a single event.
    ///
    /// Fails with [`Error::WouldBlock`] if the request is non-blocking and no
    /// event is pending.
    pub fn read_event(&mut self) -> Result<EdgeEvent> {
        let mut records = self.records.fill(1)?.ok_or(Error::WouldBlock)?;
        let record = records.next().ok_or(Error::WouldBlock)?;
        EdgeEvent::from_v2(&record)
    }

    /// Wait until an event is pending. Returns `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        self.records.wait(timeout)
    }
}

/// The events returned by one [`EdgeEventReader::read`].
#[derive(Debug)]
pub struct EdgeEvents<'r> {
    records: Option<RecordBatch<'r, gpio_line_event>>,
}

impl Iterator for EdgeEvents<'_> {
    type Item = Result<EdgeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.as_mut()?.next()?;
        Some(EdgeEvent::from_v2(&record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records
            .as_ref()
            .map_or((0, Some(0)), |records| records.size_hint())
    }
}

impl ExactSizeIterator for EdgeEvents<'_> {}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsFd;

    use crate::line::reader::{set_nonblocking, test::pipe};
    use crate::uapi::v2::record_bytes;

    fn raw_event(seqno: u32, offset: u32, id: u32) -> gpio_line_event {
        gpio_line_event {
            timestamp_ns: 1_000 * u64::from(seqno),
            id,
            offset,
            seqno,
            line_seqno: seqno,
            ..gpio_line_event::zeroed()
        }
    }

    fn write_events(tx: &mut impl Write, seqnos: std::ops::RangeInclusive<u32>) {
        for seqno in seqnos {
            let id = if seqno % 2 == 0 {
                LineEventId::FallingEdge
            } else {
                LineEventId::RisingEdge
            };
            tx.write_all(record_bytes(&raw_event(seqno, 3, id as u32)))
                .unwrap();
        }
    }

    #[test]
    fn whole_batch() {
        let (rx, mut tx) = pipe();
        write_events(&mut tx, 1..=3);

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        let batch = reader.read(16).unwrap();
        assert_eq!(batch.len(), 3);

        let events = batch.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(events[0].kind(), EdgeKind::Rising);
        assert_eq!(events[1].kind(), EdgeKind::Falling);
        assert_eq!(events[2].offset(), 3);
        assert_eq!(events[2].timestamp_ns(), 3_000);
        assert_eq!(
            events[2].timestamp().saturating_duration_since(events[0].timestamp()),
            Duration::from_micros(2)
        );
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let (rx, mut tx) = pipe();
        write_events(&mut tx, 1..=10);

        let mut reader = EdgeEventReader::new(rx.as_fd(), 4);
        assert_eq!(reader.capacity(), 4);

        let mut seqnos = Vec::new();
        while seqnos.len() < 10 {
            for event in reader.read(usize::MAX).unwrap() {
                seqnos.push(event.unwrap().seqno());
            }
        }
        assert_eq!(seqnos, (1..=10).collect::<Vec<u64>>());
    }

    #[test]
    fn read_respects_max() {
        let (rx, mut tx) = pipe();
        write_events(&mut tx, 1..=5);

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        assert_eq!(reader.read(2).unwrap().len(), 2);
        assert_eq!(reader.read_event().unwrap().seqno(), 3);
        assert_eq!(reader.read(16).unwrap().len(), 2);
    }

    #[test]
    fn partial_record_is_corruption() {
        let (rx, mut tx) = pipe();
        let event = raw_event(1, 0, LineEventId::RisingEdge as u32);
        tx.write_all(record_bytes(&event)).unwrap();
        tx.write_all(&record_bytes(&event)[..24]).unwrap();

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        match reader.read(16) {
            Err(Error::StreamCorruption {
                record,
                expected,
                actual,
            }) => {
                assert_eq!(record, "gpio_v2_line_event");
                assert_eq!(expected, 48);
                assert_eq!(actual, 72);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn nonblocking_empty_read() {
        let (rx, _tx) = pipe();
        set_nonblocking(rx.as_fd(), true).unwrap();

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        assert_eq!(reader.read(16).unwrap().len(), 0);
        assert!(reader.read_event().unwrap_err().is_would_block());
        assert!(!reader.wait(Some(Duration::ZERO)).unwrap());
    }

    #[test]
    fn unknown_event_id() {
        let (rx, mut tx) = pipe();
        tx.write_all(record_bytes(&raw_event(1, 0, 9))).unwrap();

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        let mut batch = reader.read(16).unwrap();
        assert!(matches!(batch.next(), Some(Err(Error::InvalidData(_)))));
        assert!(batch.next().is_none());
    }

    #[test]
    fn closed_writer() {
        let (rx, tx) = pipe();
        drop(tx);

        let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
        assert!(matches!(reader.read(16), Err(Error::Closed)));
    }

    #[test]
    fn closed_while_blocking() {
        let (rx, tx) = pipe();

        let res = std::thread::scope(|s| {
            let blocked = s.spawn(|| {
                let mut reader = EdgeEventReader::new(rx.as_fd(), 16);
                reader.read(16).map(|batch| batch.len())
            });
            std::thread::sleep(Duration::from_millis(50));
            drop(tx);
            blocked.join().unwrap()
        });

        assert!(matches!(res, Err(Error::Closed)));
    }

    #[test]
    fn monotonic_clock_advances() {
        let a = Timestamp::now(EventClock::Monotonic).unwrap();
        let b = Timestamp::now(EventClock::Monotonic).unwrap();
        assert!(b >= a);
        assert!(Timestamp::now(EventClock::Hte).is_err());
    }
}
