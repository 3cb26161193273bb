// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Print edge events from input lines, optionally also line info changes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use gpiod_core::{
    Bias, Chip, EdgeDetect, EventClock, LineConfig, LineSettings, RequestConfig, Timestamp,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The offsets of the GPIO lines to watch
    #[structopt(required = true)]
    lines: Vec<u32>,
    /// Enable the internal pull-up
    #[structopt(long)]
    pull_up: bool,
    /// Debounce period in microseconds
    #[structopt(long, default_value = "0")]
    debounce_us: u64,
    /// Timestamp events with the realtime clock
    #[structopt(long)]
    realtime: bool,
    /// Number of events to read before exiting
    #[structopt(short = "n", long)]
    num_events: Option<usize>,
    /// Also report line info changes of the watched lines
    #[structopt(long)]
    info: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::from_args();
    let chip = Chip::open(&args.chip)
        .with_context(|| format!("failed to open {}", args.chip.display()))?;

    let clock = if args.realtime {
        EventClock::Realtime
    } else {
        EventClock::Monotonic
    };
    let mut settings = LineSettings::input()
        .with_edge_detection(EdgeDetect::Both)
        .with_debounce_period(Duration::from_micros(args.debounce_us))
        .with_event_clock(clock);
    if args.pull_up {
        settings = settings.with_bias(Bias::PullUp);
    }

    if args.info {
        for &offset in &args.lines {
            chip.watch_line_info(offset)?;
        }
    }

    let request = chip
        .request_lines(
            args.lines.as_slice(),
            &LineConfig::new().with_default(settings),
            &RequestConfig::new()
                .with_consumer("watch_edges")?
                .with_event_buffer_size(64)?,
        )
        .context("failed to request lines")?;

    let mut events = request.edge_events();
    let mut watcher = chip.info_watcher(16);
    chip.set_nonblocking(true)?;

    let mut seen = 0;
    while args.num_events.map_or(true, |n| seen < n) {
        if !request.wait_edge_events(Some(Duration::from_millis(100)))? {
            if args.info {
                for change in watcher.read(16)? {
                    let change = change?;
                    println!(
                        "{:>20} line {:>3} {:?}",
                        change.timestamp().as_nanos(),
                        change.info().offset(),
                        change.kind()
                    );
                }
            }
            continue;
        }

        for event in events.read(events.capacity())? {
            let event = event?;
            let latency = Timestamp::now(clock)?.saturating_duration_since(event.timestamp());
            println!(
                "{:>20} line {:>3} {:?} seqno={} line_seqno={} latency={:?}",
                event.timestamp_ns(),
                event.offset(),
                event.kind(),
                event.seqno(),
                event.line_seqno(),
                latency
            );
            seen += 1;
        }
    }

    Ok(())
}
