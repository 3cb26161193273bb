// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! List the lines of every GPIO chip, or of the chips given on the command line.

use std::path::PathBuf;

use anyhow::Context;
use gpiod_core::{chips, Bias, Chip, Direction, Drive, EdgeDetect, LineInfo};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip devices to list (e.g. /dev/gpiochip0), all chips if omitted
    chips: Vec<PathBuf>,
}

fn describe(info: &LineInfo) -> String {
    let mut flags = vec![];

    if info.is_used() {
        flags.push("used");
    }

    match info.direction() {
        Direction::Input => flags.push("input"),
        Direction::Output => flags.push("output"),
    }

    if info.is_active_low() {
        flags.push("active-low");
    }

    match info.drive() {
        Some(Drive::OpenDrain) => flags.push("open-drain"),
        Some(Drive::OpenSource) => flags.push("open-source"),
        _ => {}
    }

    match info.bias() {
        Bias::PullUp => flags.push("pull-up"),
        Bias::PullDown => flags.push("pull-down"),
        Bias::Disabled => flags.push("bias-disabled"),
        Bias::Unspecified => {}
    }

    match info.edge_detection() {
        EdgeDetect::Rising => flags.push("rising-edge"),
        EdgeDetect::Falling => flags.push("falling-edge"),
        EdgeDetect::Both => flags.push("both-edges"),
        EdgeDetect::None => {}
    }

    let mut usage = format!("[{}]", flags.join(" "));
    if !info.debounce_period().is_zero() {
        usage.push_str(&format!(" debounce={:?}", info.debounce_period()));
    }
    usage
}

fn list(chip: &Chip) -> anyhow::Result<()> {
    println!(
        "GPIO chip: {}, \"{}\", {} GPIO lines",
        chip.name(),
        chip.label(),
        chip.num_lines()
    );

    for info in chip.lines() {
        let info = match info {
            Ok(info) => info,
            Err(e) => {
                eprintln!("\terror reading line: {e}");
                continue;
            }
        };

        println!(
            "\tline {offset:>3}: {name:>16} {consumer:>16} {usage}",
            offset = info.offset(),
            name = info.name().unwrap_or("unnamed"),
            consumer = info.consumer().unwrap_or("unused"),
            usage = describe(&info),
        );
    }
    println!();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::from_args();

    if args.chips.is_empty() {
        for chip in chips().context("failed to scan /dev for gpio chips")? {
            match chip {
                Ok(chip) => list(&chip)?,
                Err(e) => eprintln!("failed to open chip: {e}"),
            }
        }
    } else {
        for path in &args.chips {
            let chip =
                Chip::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            list(&chip)?;
        }
    }

    Ok(())
}
