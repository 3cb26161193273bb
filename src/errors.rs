// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use nix::errno::Errno;

use crate::fixed_str::FixedStrErr;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by chip, request and event operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration was rejected before reaching the kernel.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The kernel rejected a request or an ioctl on a request.
    #[error("{}", request_failed_msg(.offset, .errno))]
    RequestFailed { offset: Option<u32>, errno: Errno },

    /// The offset is not one of the lines held by the request.
    #[error("offset {0} is not part of this request")]
    InvalidOffset(u32),

    /// A value was written to a line that is not configured as an output.
    #[error("line {0} is not configured as an output")]
    DirectionMismatch(u32),

    /// A read returned a trailing partial record. The descriptor is unusable.
    #[error("stream corruption reading {record}: read {actual} bytes, not a multiple of {expected}")]
    StreamCorruption {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No data is available on a non-blocking descriptor.
    #[error("operation would block")]
    WouldBlock,

    /// The descriptor has been closed or its device has gone away.
    #[error("descriptor closed")]
    Closed,

    /// The kernel returned data that could not be decoded.
    #[error("invalid data from kernel: {0}")]
    InvalidData(String),

    #[error("{} is not a GPIO character device", .0.display())]
    NotGpioChip(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn request_failed_msg(offset: &Option<u32>, errno: &Errno) -> String {
    match offset {
        Some(offset) => format!("request for line {offset} failed: {errno}"),
        None => format!("request failed: {errno}"),
    }
}

impl Error {
    /// Map an errno from an ioctl against a chip or request descriptor.
    pub(crate) fn from_errno(offset: Option<u32>, errno: Errno) -> Self {
        match errno {
            Errno::EBADF | Errno::ENODEV => Self::Closed,
            errno => Self::RequestFailed { offset, errno },
        }
    }

    /// The underlying errno for kernel failures.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::RequestFailed { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

impl From<FixedStrErr> for Error {
    fn from(value: FixedStrErr) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// The rule a line's settings break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsConflict {
    /// Edge detection requested on an output line.
    EdgeOnOutput,
    /// Drive mode set on an input line.
    DriveOnInput,
    /// A non-zero debounce period set on an output line.
    DebounceOnOutput,
    /// The debounce period does not fit the kernel's 32-bit microsecond field.
    DebounceTooLong,
}

impl std::fmt::Display for SettingsConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::EdgeOnOutput => "edge detection requires an input line",
            Self::DriveOnInput => "drive mode requires an output line",
            Self::DebounceOnOutput => "debounce requires an input line",
            Self::DebounceTooLong => "debounce period exceeds u32::MAX microseconds",
        };
        f.write_str(msg)
    }
}

/// Configuration problems detected before touching the kernel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("offset {offset} is out of range for a chip with {num_lines} lines")]
    InvalidOffset { offset: u32, num_lines: u32 },

    #[error("offset {0} appears more than once")]
    DuplicateOffset(u32),

    #[error("settings for offset {0} reference a line that is not requested")]
    NotRequested(u32),

    #[error("no offsets requested")]
    NoOffsets,

    #[error("{requested} lines requested, at most {max} allowed")]
    TooManyLines { requested: usize, max: usize },

    #[error("line {offset}: {conflict}")]
    ConflictingSettings {
        offset: u32,
        conflict: SettingsConflict,
    },

    #[error("configuration needs {required} kernel attributes, at most {max} allowed")]
    TooManyDistinctConfigs { required: usize, max: usize },

    #[error("consumer label contains a NUL byte")]
    InvalidConsumer,

    #[error("event buffer size must be at least 1")]
    ZeroEventBuffer,
}
