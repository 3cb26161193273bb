// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp::Ordering;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bstr::ByteSlice;

use crate::errors::{ConfigError, Error, Result};
use crate::fixed_str::FixedStr;
use crate::line::{
    set_nonblocking, wait_for_readable, AsLineSet, InfoWatcher, LineConfig, LineInfo,
    LineRequest, RequestConfig,
};
use crate::uapi;

/// Identity of a GPIO chip as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    name: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    label: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    num_lines: u32,
}

impl ChipInfo {
    fn read(fd: BorrowedFd<'_>) -> Result<Self> {
        let mut info = uapi::gpio_chip_info::zeroed();
        // SAFETY: info is a valid gpiochip_info
        unsafe { uapi::gpio_get_chipinfo(fd.as_raw_fd(), &mut info) }
            .map_err(|errno| Error::from_errno(None, errno))?;

        Ok(Self {
            name: FixedStr::from_byte_array(info.name)?,
            label: FixedStr::from_byte_array(info.label)?,
            num_lines: info.lines,
        })
    }

    /// The name of the device driving this GPIO chip in the kernel
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A functional name for this GPIO chip, such as a product number.  Might
    /// be an empty string.
    ///
    /// As an example, the SoC GPIO chip on a Raspberry Pi is "pinctrl-bcm2835"
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The number of lines/pins indexable through this chip
    ///
    /// Not all of these may be usable depending on how the hardware is
    /// configured/muxed.
    pub const fn num_lines(&self) -> u32 {
        self.num_lines
    }
}

/// A GPIO Chip maps to the actual device driver instance in hardware that
/// one interacts with to interact with individual GPIOs.  Often these chips
/// map to IP chunks on an SoC but could also be enumerated within the kernel
/// via something like a PCI or USB bus.
///
/// It is best not to assume that a device will always be enumerated in the
/// same order (especially if it is connected via a bus).  To reliably find
/// the correct chip, either match on [`ChipInfo::label`] while iterating
/// [`chips()`], or look a line up by name with [`find_line`].
#[derive(Debug)]
pub struct Chip {
    fd: OwnedFd,
    path: PathBuf,
    info: ChipInfo,
}

impl Chip {
    /// Open the GPIO chip at the provided path (e.g. `/dev/gpiochip<N>`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !is_gpiochip_device(path) {
            return Err(Error::NotGpioChip(path.to_owned()));
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        let fd = OwnedFd::from(file);
        let info = ChipInfo::read(fd.as_fd())?;

        tracing::debug!(
            path = %path.display(),
            name = info.name(),
            label = info.label(),
            lines = info.num_lines(),
            "opened gpio chip"
        );

        Ok(Self {
            fd,
            path: path.to_owned(),
            info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &ChipInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn label(&self) -> &str {
        self.info.label()
    }

    pub fn num_lines(&self) -> u32 {
        self.info.num_lines()
    }

    fn check_offset(&self, offset: u32) -> Result<()> {
        if offset < self.num_lines() {
            Ok(())
        } else {
            Err(ConfigError::InvalidOffset {
                offset,
                num_lines: self.num_lines(),
            }
            .into())
        }
    }

    /// Get the information of a line at a given offset.
    pub fn line_info(&self, offset: u32) -> Result<LineInfo> {
        self.check_offset(offset)?;
        let mut info = uapi::v2::gpio_line_info::for_offset(offset);
        // SAFETY: info is a valid gpio_v2_line_info
        unsafe { uapi::v2::gpio_get_lineinfo(self.fd.as_raw_fd(), &mut info) }
            .map_err(|errno| Error::from_errno(Some(offset), errno))?;
        LineInfo::from_v2(&info)
    }

    /// Information on every line of the chip, in offset order.
    pub fn lines(&self) -> impl Iterator<Item = Result<LineInfo>> + '_ {
        (0..self.num_lines()).map(|offset| self.line_info(offset))
    }

    /// The offset of the first line called `name`, if any.
    pub fn line_offset_from_name(&self, name: &str) -> Result<Option<u32>> {
        for info in self.lines() {
            let info = info?;
            if info.name() == Some(name) {
                return Ok(Some(info.offset()));
            }
        }
        Ok(None)
    }

    /// Start reporting changes to a line through [`info_watcher`](Self::info_watcher).
    ///
    /// Returns the current state of the line.
    pub fn watch_line_info(&self, offset: u32) -> Result<LineInfo> {
        self.check_offset(offset)?;
        let mut info = uapi::v2::gpio_line_info::for_offset(offset);
        // SAFETY: info is a valid gpio_v2_line_info
        unsafe { uapi::v2::gpio_get_lineinfo_watch(self.fd.as_raw_fd(), &mut info) }
            .map_err(|errno| Error::from_errno(Some(offset), errno))?;

        tracing::debug!(chip = self.name(), offset, "watching line info");
        LineInfo::from_v2(&info)
    }

    pub fn unwatch_line_info(&self, offset: u32) -> Result<()> {
        self.check_offset(offset)?;
        let mut raw = offset;
        // SAFETY: the kernel reads a single u32 offset
        unsafe { uapi::gpio_get_lineinfo_unwatch(self.fd.as_raw_fd(), &mut raw) }
            .map_err(|errno| Error::from_errno(Some(offset), errno))?;

        tracing::debug!(chip = self.name(), offset, "stopped watching line info");
        Ok(())
    }

    /// Request exclusive use of `offsets`, configured by `config`.
    ///
    /// ```no_run
    /// use gpiod_core::{Chip, LineConfig, LineSettings, LineValue, RequestConfig};
    ///
    /// # fn main() -> gpiod_core::Result<()> {
    /// let chip = Chip::open("/dev/gpiochip0")?;
    /// let config = LineConfig::new().with_default(LineSettings::output(LineValue::Inactive));
    /// let request = chip.request_lines([4, 5], &config, &RequestConfig::new().with_consumer("demo")?)?;
    /// request.set_value(4, LineValue::Active)?;
    /// # Ok(()) }
    /// ```
    pub fn request_lines(
        &self,
        offsets: impl AsLineSet,
        config: &LineConfig,
        request: &RequestConfig,
    ) -> Result<LineRequest> {
        LineRequest::new(
            self.fd.as_fd(),
            self.info.name,
            self.num_lines(),
            offsets,
            config,
            request,
        )
    }

    /// A reader for changes to the lines watched with
    /// [`watch_line_info`](Self::watch_line_info), buffering up to
    /// `capacity` events per read.
    pub fn info_watcher(&self, capacity: usize) -> InfoWatcher<'_> {
        InfoWatcher::new(self.fd.as_fd(), capacity)
    }

    /// Wait for a line info change to become pending. Returns `false` on
    /// timeout.
    pub fn wait_info_event(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_for_readable(self.fd.as_fd(), timeout)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        set_nonblocking(self.fd.as_fd(), nonblocking)
    }
}

impl AsFd for Chip {
    #[inline(always)]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Chip {
    #[inline(always)]
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Check that `path` is a GPIO character device.
///
/// The path must be the device node itself, not a symlink, and the sysfs
/// `subsystem` of the device must be the gpio bus.
pub fn is_gpiochip_device(path: impl AsRef<Path>) -> bool {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if !meta.file_type().is_char_device() {
        return false;
    }

    let rdev = meta.rdev();
    let subsystem = format!(
        "/sys/dev/char/{}:{}/subsystem",
        nix::sys::stat::major(rdev),
        nix::sys::stat::minor(rdev)
    );

    std::fs::canonicalize(subsystem)
        .map(|p| p == Path::new("/sys/bus/gpio"))
        .unwrap_or(false)
}

/// Iterate over all GPIO chips currently present on this system, in natural
/// order of their device names.
pub fn chips() -> Result<ChipIterator> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir("/dev")? {
        let entry = entry?;
        if !entry.file_name().as_bytes().starts_with_str("gpiochip") {
            continue;
        }
        let path = entry.path();
        if is_gpiochip_device(&path) {
            paths.push(path);
        }
    }

    paths.sort_by(|a, b| natural_cmp(a, b));
    Ok(ChipIterator {
        paths: paths.into_iter(),
    })
}

/// Iterator over chips
#[derive(Debug)]
pub struct ChipIterator {
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ChipIterator {
    type Item = Result<Chip>;

    fn next(&mut self) -> Option<Result<Chip>> {
        self.paths.next().map(Chip::open)
    }
}

/// Find the first line called `name` on any chip.
///
/// Returns the path of the chip and the offset of the line.
pub fn find_line(name: &str) -> Result<Option<(PathBuf, u32)>> {
    for chip in chips()? {
        let chip = chip?;
        if let Some(offset) = chip.line_offset_from_name(name)? {
            return Ok(Some((chip.path, offset)));
        }
    }
    Ok(None)
}

/// Order file names so that `gpiochip2` sorts before `gpiochip10`.
fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    fn split(p: &Path) -> (&[u8], Option<u64>) {
        let name = p.file_name().map_or(&[][..], |n| n.as_bytes());
        let digits = name.iter().rev().take_while(|c| c.is_ascii_digit()).count();
        let (stem, num) = name.split_at(name.len() - digits);
        let num = num.to_str().ok().and_then(|n| n.parse().ok());
        (stem, num)
    }

    split(a).cmp(&split(b))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn natural_order() {
        let mut paths = ["/dev/gpiochip10", "/dev/gpiochip2", "/dev/gpiochip0", "/dev/gpiochip1"]
            .map(PathBuf::from)
            .to_vec();
        paths.sort_by(|a, b| natural_cmp(a, b));

        assert_eq!(
            paths,
            ["/dev/gpiochip0", "/dev/gpiochip1", "/dev/gpiochip2", "/dev/gpiochip10"]
                .map(PathBuf::from)
        );
    }

    #[test]
    fn non_devices_are_rejected() {
        assert!(!is_gpiochip_device("/dev/null"));
        assert!(!is_gpiochip_device("/nonexistent/gpiochip0"));
        assert!(!is_gpiochip_device(std::env::temp_dir()));

        assert!(matches!(
            Chip::open("/dev/null"),
            Err(Error::NotGpioChip(_))
        ));
    }
}
