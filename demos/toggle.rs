// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Toggle one or more output lines together at a fixed period.

use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::Context;
use gpiod_core::{Chip, Drive, LineConfig, LineSettings, LineValue, RequestConfig};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The offsets of the GPIO lines to toggle
    #[structopt(required = true)]
    lines: Vec<u32>,
    /// Half period in milliseconds
    #[structopt(short, long, default_value = "500")]
    period_ms: u64,
    /// Duration over which to toggle in milliseconds
    #[structopt(short, long, default_value = "5000")]
    duration_ms: u64,
    /// Drive the lines open-drain
    #[structopt(long)]
    open_drain: bool,
    /// Treat low as active
    #[structopt(long)]
    active_low: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::from_args();
    let chip = Chip::open(&args.chip)
        .with_context(|| format!("failed to open {}", args.chip.display()))?;

    let mut settings = LineSettings::output(LineValue::Inactive).with_active_low(args.active_low);
    if args.open_drain {
        settings = settings.with_drive(Drive::OpenDrain);
    }

    let request = chip
        .request_lines(
            args.lines.as_slice(),
            &LineConfig::new().with_default(settings),
            &RequestConfig::new().with_consumer("toggle")?,
        )
        .context("failed to request lines")?;

    let period = Duration::from_millis(args.period_ms);
    let duration = Duration::from_millis(args.duration_ms);
    let start = Instant::now();
    let mut value = LineValue::Inactive;

    while start.elapsed() < duration {
        value = !value;
        request.set_values(value)?;
        println!("{:?}", request.values()?);
        sleep(period);
    }

    request.set_values(LineValue::Inactive)?;
    Ok(())
}
