// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Find a line by name across all chips.

use gpiod_core::{find_line, Chip};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The name of the line to look up
    name: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::from_args();

    match find_line(&args.name)? {
        Some((path, offset)) => {
            let chip = Chip::open(&path)?;
            let info = chip.line_info(offset)?;
            println!(
                "{} {} ({}): {:?}",
                chip.name(),
                offset,
                path.display(),
                info.settings()
            );
            Ok(())
        }
        None => anyhow::bail!("no line named {:?}", args.name),
    }
}
