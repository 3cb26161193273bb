// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::Duration;

use crate::errors::{ConfigError, SettingsConflict};
use crate::uapi::v2::LineFlags;

use super::values::LineValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Active {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EdgeDetect {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Drive {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Bias {
    /// Leave the bias as configured by the kernel or firmware.
    #[default]
    Unspecified,
    Disabled,
    PullUp,
    PullDown,
}

/// Clock used to timestamp edge events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventClock {
    #[default]
    Monotonic,
    Realtime,
    /// Hardware timestamp engine.
    Hte,
}

/// The desired configuration of a single line.
///
/// Settings are built up freely; combinations that make no sense for the
/// chosen direction (edge detection on an output, a drive mode on an input,
/// ...) are only rejected when a [`LineConfig`](super::LineConfig) is turned
/// into a request, where the offending offset can be reported.
///
/// ```
/// use gpiod_core::line::settings::{Bias, EdgeDetect, LineSettings};
/// use std::time::Duration;
///
/// const BUTTON: LineSettings = LineSettings::input()
///     .with_bias(Bias::PullUp)
///     .with_edge_detection(EdgeDetect::Falling)
///     .with_debounce_period(Duration::from_millis(5));
/// # let _ = BUTTON;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineSettings {
    direction: Direction,
    edge: EdgeDetect,
    bias: Bias,
    drive: Option<Drive>,
    active: Active,
    debounce: Duration,
    output: LineValue,
    clock: EventClock,
}

impl LineSettings {
    pub const fn new() -> Self {
        Self {
            direction: Direction::Input,
            edge: EdgeDetect::None,
            bias: Bias::Unspecified,
            drive: None,
            active: Active::High,
            debounce: Duration::ZERO,
            output: LineValue::Inactive,
            clock: EventClock::Monotonic,
        }
    }

    pub const fn input() -> Self {
        Self::new()
    }

    /// An output driven to `value` when the request is made.
    pub const fn output(value: LineValue) -> Self {
        Self {
            direction: Direction::Output,
            output: value,
            ..Self::new()
        }
    }

    pub const fn with_direction(self, direction: Direction) -> Self {
        Self { direction, ..self }
    }

    pub const fn with_edge_detection(self, edge: EdgeDetect) -> Self {
        Self { edge, ..self }
    }

    pub const fn with_bias(self, bias: Bias) -> Self {
        Self { bias, ..self }
    }

    pub const fn with_drive(self, drive: Drive) -> Self {
        Self {
            drive: Some(drive),
            ..self
        }
    }

    pub const fn with_active(self, active: Active) -> Self {
        Self { active, ..self }
    }

    pub const fn with_active_low(self, active_low: bool) -> Self {
        let active = if active_low { Active::Low } else { Active::High };
        Self { active, ..self }
    }

    /// A zero period disables debouncing.
    pub const fn with_debounce_period(self, debounce: Duration) -> Self {
        Self { debounce, ..self }
    }

    pub const fn with_output_value(self, output: LineValue) -> Self {
        Self { output, ..self }
    }

    pub const fn with_event_clock(self, clock: EventClock) -> Self {
        Self { clock, ..self }
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn edge_detection(&self) -> EdgeDetect {
        self.edge
    }

    pub const fn bias(&self) -> Bias {
        self.bias
    }

    /// The drive mode, if one was set explicitly.
    pub const fn drive(&self) -> Option<Drive> {
        self.drive
    }

    pub const fn active(&self) -> Active {
        self.active
    }

    pub const fn is_active_low(&self) -> bool {
        matches!(self.active, Active::Low)
    }

    pub const fn debounce_period(&self) -> Duration {
        self.debounce
    }

    pub const fn output_value(&self) -> LineValue {
        self.output
    }

    pub const fn event_clock(&self) -> EventClock {
        self.clock
    }

    /// Check the settings against the rules of their direction and reduce
    /// them to the fields the kernel will act on.
    pub(crate) fn resolve(&self, offset: u32) -> Result<ResolvedSettings, ConfigError> {
        let conflict = |conflict| ConfigError::ConflictingSettings { offset, conflict };

        let mode = match self.direction {
            Direction::Input => {
                if self.drive.is_some() {
                    return Err(conflict(SettingsConflict::DriveOnInput));
                }
                let debounce_us = u32::try_from(self.debounce.as_micros())
                    .map_err(|_| conflict(SettingsConflict::DebounceTooLong))?;
                LineMode::Input {
                    edge: self.edge,
                    debounce_us,
                    clock: self.clock,
                }
            }
            Direction::Output => {
                if self.edge != EdgeDetect::None {
                    return Err(conflict(SettingsConflict::EdgeOnOutput));
                }
                if !self.debounce.is_zero() {
                    return Err(conflict(SettingsConflict::DebounceOnOutput));
                }
                LineMode::Output {
                    drive: self.drive.unwrap_or_default(),
                    value: self.output,
                }
            }
        };

        Ok(ResolvedSettings {
            mode,
            bias: self.bias,
            active: self.active,
        })
    }

    /// Rebuild settings from the flags reported or accepted by the kernel.
    ///
    /// Lines are considered to be inputs unless explicitly marked as outputs.
    pub(crate) fn from_flags(flags: LineFlags) -> Self {
        let active = if flags.contains(LineFlags::ACTIVE_LOW) {
            Active::Low
        } else {
            Active::High
        };

        let bias = if flags.contains(LineFlags::BIAS_PULL_UP) {
            Bias::PullUp
        } else if flags.contains(LineFlags::BIAS_PULL_DOWN) {
            Bias::PullDown
        } else if flags.contains(LineFlags::BIAS_DISABLED) {
            Bias::Disabled
        } else {
            Bias::Unspecified
        };

        let settings = Self {
            active,
            bias,
            ..Self::new()
        };

        if flags.contains(LineFlags::OUTPUT) {
            let drive = if flags.contains(LineFlags::OPEN_DRAIN) {
                Drive::OpenDrain
            } else if flags.contains(LineFlags::OPEN_SOURCE) {
                Drive::OpenSource
            } else {
                Drive::PushPull
            };
            return settings
                .with_direction(Direction::Output)
                .with_drive(drive);
        }

        let edge = match (
            flags.contains(LineFlags::EDGE_RISING),
            flags.contains(LineFlags::EDGE_FALLING),
        ) {
            (true, true) => EdgeDetect::Both,
            (true, false) => EdgeDetect::Rising,
            (false, true) => EdgeDetect::Falling,
            (false, false) => EdgeDetect::None,
        };

        let clock = if flags.contains(LineFlags::EVENT_CLOCK_REALTIME) {
            EventClock::Realtime
        } else if flags.contains(LineFlags::EVENT_CLOCK_HTE) {
            EventClock::Hte
        } else {
            EventClock::Monotonic
        };

        settings.with_edge_detection(edge).with_event_clock(clock)
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction specific part of [`ResolvedSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LineMode {
    Input {
        edge: EdgeDetect,
        debounce_us: u32,
        clock: EventClock,
    },
    Output {
        drive: Drive,
        value: LineValue,
    },
}

/// Settings that passed validation, holding only what applies to the line's
/// direction. Two lines with equal resolved settings share kernel attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResolvedSettings {
    pub(crate) mode: LineMode,
    pub(crate) bias: Bias,
    pub(crate) active: Active,
}

impl ResolvedSettings {
    pub(crate) const fn flags(&self) -> LineFlags {
        let flags = match self.mode {
            LineMode::Input { .. } => LineFlags::INPUT,
            LineMode::Output { .. } => LineFlags::OUTPUT,
        };

        let flags = match self.active {
            Active::Low => flags.union(LineFlags::ACTIVE_LOW),
            Active::High => flags,
        };

        let flags = match self.bias {
            Bias::PullDown => flags.union(LineFlags::BIAS_PULL_DOWN),
            Bias::PullUp => flags.union(LineFlags::BIAS_PULL_UP),
            Bias::Disabled => flags.union(LineFlags::BIAS_DISABLED),
            Bias::Unspecified => flags,
        };

        match self.mode {
            LineMode::Input { edge, clock, .. } => {
                let flags = match edge {
                    EdgeDetect::Both => flags
                        .union(LineFlags::EDGE_RISING)
                        .union(LineFlags::EDGE_FALLING),
                    EdgeDetect::Rising => flags.union(LineFlags::EDGE_RISING),
                    EdgeDetect::Falling => flags.union(LineFlags::EDGE_FALLING),
                    EdgeDetect::None => flags,
                };

                match clock {
                    EventClock::Realtime => flags.union(LineFlags::EVENT_CLOCK_REALTIME),
                    EventClock::Hte => flags.union(LineFlags::EVENT_CLOCK_HTE),
                    EventClock::Monotonic => flags,
                }
            }
            LineMode::Output { drive, .. } => match drive {
                Drive::OpenDrain => flags.union(LineFlags::OPEN_DRAIN),
                Drive::OpenSource => flags.union(LineFlags::OPEN_SOURCE),
                Drive::PushPull => flags,
            },
        }
    }

    pub(crate) const fn debounce_us(&self) -> u32 {
        match self.mode {
            LineMode::Input { debounce_us, .. } => debounce_us,
            LineMode::Output { .. } => 0,
        }
    }

    /// The output value, for output lines.
    pub(crate) const fn output_value(&self) -> Option<LineValue> {
        match self.mode {
            LineMode::Output { value, .. } => Some(value),
            LineMode::Input { .. } => None,
        }
    }

    /// The settings the kernel ends up applying, as a [`LineSettings`].
    pub(crate) fn effective(&self) -> LineSettings {
        let settings = LineSettings::from_flags(self.flags());
        match self.mode {
            LineMode::Input { debounce_us, .. } => {
                settings.with_debounce_period(Duration::from_micros(debounce_us.into()))
            }
            LineMode::Output { value, .. } => settings.with_output_value(value),
        }
    }
}
