// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simulated GPIO chips backed by the kernel's `gpio-sim` module.
//!
//! Creating a chip needs the module loaded, configfs mounted and write access
//! to it. When any of that is missing the helpers return `None` and tests
//! skip themselves.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const CONFIGFS_ROOT: &str = "/sys/kernel/config/gpio-sim";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
}

/// A live simulated chip with a single bank. Torn down on drop.
#[derive(Debug)]
pub struct SimChip {
    dir: PathBuf,
    lines: Vec<PathBuf>,
    dev_path: PathBuf,
    sysfs: PathBuf,
}

impl SimChip {
    /// Create a chip with `num_lines` lines, naming some of them.
    ///
    /// Returns `None` if gpio-sim is not usable on this machine.
    pub fn new(test: &str, num_lines: u32, names: &[(u32, &str)]) -> Option<Self> {
        match Self::try_new(test, num_lines, names) {
            Ok(sim) => Some(sim),
            Err(err) => {
                eprintln!("skipping {test}: gpio-sim unavailable: {err}");
                None
            }
        }
    }

    fn try_new(test: &str, num_lines: u32, names: &[(u32, &str)]) -> io::Result<Self> {
        if !Path::new(CONFIGFS_ROOT).is_dir() {
            return Err(io::Error::new(io::ErrorKind::NotFound, CONFIGFS_ROOT));
        }

        let dir = Path::new(CONFIGFS_ROOT).join(format!("{test}-{}", std::process::id()));
        fs::create_dir(&dir)?;

        // from here on drop cleans up whatever was created
        let mut sim = SimChip {
            dir,
            lines: Vec::new(),
            dev_path: PathBuf::new(),
            sysfs: PathBuf::new(),
        };

        let bank = sim.dir.join("bank0");
        fs::create_dir(&bank)?;
        fs::write(bank.join("num_lines"), num_lines.to_string())?;
        fs::write(bank.join("label"), test)?;

        for &(offset, name) in names {
            let line = bank.join(format!("line{offset}"));
            fs::create_dir(&line)?;
            sim.lines.push(line.clone());
            fs::write(line.join("name"), name)?;
        }

        fs::write(sim.dir.join("live"), "1")?;

        let dev_name = read_trimmed(sim.dir.join("dev_name"))?;
        let chip_name = read_trimmed(bank.join("chip_name"))?;

        sim.dev_path = Path::new("/dev").join(&chip_name);
        sim.sysfs = Path::new("/sys/devices/platform")
            .join(dev_name)
            .join(chip_name);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !sim.dev_path.exists() {
            if Instant::now() > deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "device node missing"));
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        Ok(sim)
    }

    pub fn dev_path(&self) -> &Path {
        &self.dev_path
    }

    /// Drive the simulated input level of a line.
    pub fn set_pull(&self, offset: u32, pull: Pull) {
        let value = match pull {
            Pull::Up => "pull-up",
            Pull::Down => "pull-down",
        };
        fs::write(self.sim_gpio(offset).join("pull"), value).unwrap();
    }

    /// The physical level the line is driven to, as seen by the simulator.
    pub fn level(&self, offset: u32) -> bool {
        read_trimmed(self.sim_gpio(offset).join("value")).unwrap() == "1"
    }

    fn sim_gpio(&self, offset: u32) -> PathBuf {
        self.sysfs.join(format!("sim_gpio{offset}"))
    }
}

impl Drop for SimChip {
    fn drop(&mut self) {
        let _ = fs::write(self.dir.join("live"), "0");
        for line in self.lines.drain(..).rev() {
            let _ = fs::remove_dir(line);
        }
        let _ = fs::remove_dir(self.dir.join("bank0"));
        let _ = fs::remove_dir(&self.dir);
    }
}

fn read_trimmed(path: impl AsRef<Path>) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_owned())
}

/// Route library logs to the test output. `RUST_LOG=gpiod_core=trace` for
/// detail.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
