// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Buffered reads of fixed-size kernel records from a chip or request file.

use std::marker::PhantomData;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::errors::{Error, Result};
use crate::uapi::v2::{KernelRecord, GPIO_EVENT_BUFFER_MAX};

/// Reads whole `T` records into an owned scratch buffer.
#[derive(Debug)]
pub(crate) struct RecordReader<'a, T> {
    fd: BorrowedFd<'a>,
    buf: Vec<u8>,
    _record: PhantomData<T>,
}

impl<'a, T: KernelRecord> RecordReader<'a, T> {
    /// `capacity` is clamped to `1..=GPIO_EVENT_BUFFER_MAX` records.
    pub(crate) fn new(fd: BorrowedFd<'a>, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, GPIO_EVENT_BUFFER_MAX);
        Self {
            fd,
            buf: vec![0; capacity * T::SIZE],
            _record: PhantomData,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len() / T::SIZE
    }

    /// One `read(2)` of at most `max` records.
    ///
    /// Returns `Ok(None)` if the descriptor is non-blocking and nothing is
    /// pending.
    pub(crate) fn fill(&mut self, max: usize) -> Result<Option<RecordBatch<'_, T>>> {
        let len = max.min(self.capacity()) * T::SIZE;
        if len == 0 {
            return Ok(Some(RecordBatch::new(&[])));
        }

        let n = loop {
            // SAFETY: the buffer holds at least `len` bytes
            let res = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    self.buf.as_mut_ptr() as *mut libc::c_void,
                    len,
                )
            };
            match Errno::result(res) {
                Ok(0) => return Err(Error::Closed),
                Ok(n) => break n as usize,
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => return Ok(None),
                Err(errno) => return Err(Error::from_errno(None, errno)),
            }
        };

        if n % T::SIZE != 0 {
            tracing::warn!(record = T::NAME, bytes = n, "partial record read");
            return Err(Error::StreamCorruption {
                record: T::NAME,
                expected: T::SIZE,
                actual: n,
            });
        }

        tracing::trace!(record = T::NAME, count = n / T::SIZE, "read records");
        Ok(Some(RecordBatch::new(&self.buf[..n])))
    }

    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_for_readable(self.fd, timeout)
    }
}

/// Records decoded lazily from a filled buffer.
#[derive(Debug, Clone)]
pub(crate) struct RecordBatch<'r, T> {
    chunks: std::slice::ChunksExact<'r, u8>,
    _record: PhantomData<T>,
}

impl<'r, T: KernelRecord> RecordBatch<'r, T> {
    fn new(bytes: &'r [u8]) -> Self {
        Self {
            chunks: bytes.chunks_exact(T::SIZE),
            _record: PhantomData,
        }
    }
}

impl<T: KernelRecord> Iterator for RecordBatch<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(T::from_bytes)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: KernelRecord> ExactSizeIterator for RecordBatch<'_, T> {}

/// Block until `fd` is readable or `timeout` passes. `None` waits forever.
///
/// Returns `false` on timeout.
pub(crate) fn wait_for_readable(fd: BorrowedFd<'_>, timeout: Option<Duration>) -> Result<bool> {
    let timeout = timeout
        .map(|t| t.as_millis().try_into().unwrap_or(PollTimeout::MAX))
        .unwrap_or(PollTimeout::NONE);

    loop {
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        match nix::poll::poll(&mut fds, timeout) {
            Ok(n) => return Ok(n > 0),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(Error::from_errno(None, errno)),
        }
    }
}

pub(crate) fn set_nonblocking(fd: BorrowedFd<'_>, nonblocking: bool) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(|e| Error::from_errno(None, e))?;

    let mut flags = OFlag::from_bits_retain(flags);
    flags.set(OFlag::O_NONBLOCK, nonblocking);

    fcntl(raw, FcntlArg::F_SETFL(flags)).map_err(|e| Error::from_errno(None, e))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::os::fd::{AsFd, OwnedFd};

    use crate::uapi::v2::{gpio_line_event, record_bytes};

    pub(crate) fn pipe() -> (OwnedFd, File) {
        let (rx, tx) = nix::unistd::pipe().unwrap();
        (rx, File::from(tx))
    }

    #[test]
    fn capacity_is_clamped() {
        let (rx, _tx) = pipe();
        let reader = RecordReader::<gpio_line_event>::new(rx.as_fd(), 0);
        assert_eq!(reader.capacity(), 1);

        let reader = RecordReader::<gpio_line_event>::new(rx.as_fd(), 100_000);
        assert_eq!(reader.capacity(), GPIO_EVENT_BUFFER_MAX);
    }

    #[test]
    fn zero_max_does_not_read() {
        let (rx, _tx) = pipe();
        let mut reader = RecordReader::<gpio_line_event>::new(rx.as_fd(), 4);
        let batch = reader.fill(0).unwrap().unwrap();
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn wait_times_out() {
        let (rx, mut tx) = pipe();
        assert!(!wait_for_readable(rx.as_fd(), Some(Duration::ZERO)).unwrap());

        tx.write_all(record_bytes(&gpio_line_event::zeroed())).unwrap();
        assert!(wait_for_readable(rx.as_fd(), Some(Duration::from_millis(100))).unwrap());
    }

    #[test]
    fn nonblocking_toggle() {
        let (rx, _tx) = pipe();
        set_nonblocking(rx.as_fd(), true).unwrap();
        let flags = OFlag::from_bits_retain(fcntl(rx.as_raw_fd(), FcntlArg::F_GETFL).unwrap());
        assert!(flags.contains(OFlag::O_NONBLOCK));

        set_nonblocking(rx.as_fd(), false).unwrap();
        let flags = OFlag::from_bits_retain(fcntl(rx.as_raw_fd(), FcntlArg::F_GETFL).unwrap());
        assert!(!flags.contains(OFlag::O_NONBLOCK));
    }
}
