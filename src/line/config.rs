// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::errors::{ConfigError, Result};
use crate::fixed_str::FixedStr;
use crate::uapi::v2::{
    gpio_line_config, gpio_line_config_attribute, gpio_line_request, LineFlags,
    GPIO_EVENT_BUFFER_MAX, GPIO_LINE_NUM_ATTRS_MAX, GPIO_MAX_NAME_SIZE,
};

use super::info::LineAttribute;
use super::set::{AsLineSet, LineSet};
use super::settings::{Direction, LineSettings};
use super::values::{LineValue, MaskedBits};

/// Number of edge event records a reader buffers when the request does not
/// set an event buffer size.
pub const DEFAULT_READER_CAPACITY: usize = 64;

/// Settings for every line of a request: one default plus per-offset
/// overrides.
///
/// Lines without an override use the default. Nothing is validated until the
/// configuration is used to request or reconfigure lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineConfig {
    default: LineSettings,
    overrides: BTreeMap<u32, LineSettings>,
}

impl LineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, settings: LineSettings) -> &mut Self {
        self.default = settings;
        self
    }

    pub fn with_default(mut self, settings: LineSettings) -> Self {
        self.default = settings;
        self
    }

    pub fn default_settings(&self) -> &LineSettings {
        &self.default
    }

    /// Override the settings of one or more offsets, replacing any earlier
    /// override for them.
    pub fn set(
        &mut self,
        offsets: impl AsLineSet,
        settings: LineSettings,
    ) -> std::result::Result<&mut Self, ConfigError> {
        for &offset in offsets.as_line_set()?.iter() {
            self.overrides.insert(offset, settings);
        }
        Ok(self)
    }

    pub fn with(
        mut self,
        offsets: impl AsLineSet,
        settings: LineSettings,
    ) -> std::result::Result<Self, ConfigError> {
        self.set(offsets, settings)?;
        Ok(self)
    }

    /// Drop the override for `offset`, returning it if there was one.
    pub fn remove(&mut self, offset: u32) -> Option<LineSettings> {
        self.overrides.remove(&offset)
    }

    /// The settings `offset` would be requested with.
    pub fn settings_for(&self, offset: u32) -> &LineSettings {
        self.overrides.get(&offset).unwrap_or(&self.default)
    }

    /// Offsets with an override, in ascending order.
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.overrides.keys().copied()
    }

    /// Validate the settings of every line in `lines` and pack them into the
    /// kernel's line configuration.
    pub(crate) fn finalize(&self, lines: &LineSet) -> std::result::Result<FinalConfig, ConfigError> {
        if let Some(offset) = self.offsets().find(|offset| !lines.contains(*offset)) {
            return Err(ConfigError::NotRequested(offset));
        }

        let resolved = lines
            .iter()
            .map(|&offset| self.settings_for(offset).resolve(offset))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // flags of the default when any line uses it, else of the first line
        let base_idx = lines
            .iter()
            .position(|offset| !self.overrides.contains_key(offset))
            .unwrap_or(0);
        let base = resolved
            .get(base_idx)
            .map_or(LineFlags::INPUT, |settings| settings.flags());

        // groups are created in order of their lowest offset
        let mut attrs: Vec<(LineAttribute, u64)> = Vec::new();
        let mut outputs = 0u64;

        for (idx, settings) in resolved.iter().enumerate() {
            let bit = 1u64 << idx;

            let flags = settings.flags();
            if flags != base {
                add_to_group(&mut attrs, LineAttribute::Flags(flags), bit);
            }

            let debounce_us = settings.debounce_us();
            if debounce_us != 0 {
                add_to_group(&mut attrs, LineAttribute::Debounce(debounce_us), bit);
            }

            if let Some(value) = settings.output_value() {
                outputs |= bit;
                let bits = if value.is_active() { bit } else { 0 };
                add_to_group(&mut attrs, LineAttribute::Values(MaskedBits::new(bits, 0)), bit);
            }
        }

        if attrs.len() > GPIO_LINE_NUM_ATTRS_MAX {
            return Err(ConfigError::TooManyDistinctConfigs {
                required: attrs.len(),
                max: GPIO_LINE_NUM_ATTRS_MAX,
            });
        }

        let mut config = gpio_line_config::zeroed();
        config.flags = base.bits();
        config.num_attrs = attrs.len() as u32;
        for ((attr, mask), wr) in attrs.iter().zip(config.attrs.iter_mut()) {
            *wr = gpio_line_config_attribute {
                attr: attr.into_v2(),
                mask: *mask,
            };
        }

        tracing::trace!(
            lines = lines.len(),
            num_attrs = attrs.len(),
            flags = ?base,
            "serialized line config"
        );

        Ok(FinalConfig { config, outputs })
    }
}

fn add_to_group(attrs: &mut Vec<(LineAttribute, u64)>, attr: LineAttribute, bit: u64) {
    let group = attrs.iter_mut().find(|(existing, _)| match (existing, &attr) {
        (LineAttribute::Values(_), LineAttribute::Values(_)) => true,
        (a, b) => a == b,
    });

    match (group, attr) {
        (Some((LineAttribute::Values(values), mask)), LineAttribute::Values(new)) => {
            values.bits |= new.bits;
            *mask |= bit;
        }
        (Some((_, mask)), _) => *mask |= bit,
        (None, attr) => attrs.push((attr, bit)),
    }
}

/// A line configuration ready to hand to the kernel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinalConfig {
    pub(crate) config: gpio_line_config,
    /// Request indices of the lines resolved as outputs
    pub(crate) outputs: u64,
}

/// Recover the settings of every line from a serialized configuration.
pub(crate) fn decode_config(
    config: &gpio_line_config,
    lines: &LineSet,
) -> Result<Vec<(u32, LineSettings)>> {
    let attrs = config
        .attrs()
        .iter()
        .map(|attr| Ok((LineAttribute::from_v2(&attr.attr)?, attr.mask)))
        .collect::<Result<Vec<_>>>()?;

    let decoded = lines
        .iter()
        .enumerate()
        .map(|(idx, &offset)| {
            let bit = 1u64 << idx;
            let mut flags = LineFlags::from_bits_retain(config.flags);
            let mut debounce_us = 0;
            let mut value = LineValue::Inactive;

            for (attr, _) in attrs.iter().filter(|(_, mask)| mask & bit != 0) {
                match attr {
                    LineAttribute::Flags(f) => flags = *f,
                    LineAttribute::Debounce(us) => debounce_us = *us,
                    LineAttribute::Values(v) => value = LineValue::new(v.bits & bit != 0),
                }
            }

            let settings = LineSettings::from_flags(flags);
            let settings = match settings.direction() {
                Direction::Input => {
                    settings.with_debounce_period(Duration::from_micros(debounce_us.into()))
                }
                Direction::Output => settings.with_output_value(value),
            };
            (offset, settings)
        })
        .collect();

    Ok(decoded)
}

/// Options that apply to a request as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    consumer: FixedStr<GPIO_MAX_NAME_SIZE>,
    event_buffer_size: Option<NonZeroU32>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the request so other users can see who holds the lines.
    ///
    /// Labels longer than 31 bytes are cut at the last character boundary
    /// that fits.
    pub fn set_consumer(&mut self, consumer: &str) -> std::result::Result<&mut Self, ConfigError> {
        let (label, cut) =
            FixedStr::truncated(consumer).map_err(|_| ConfigError::InvalidConsumer)?;
        if cut {
            tracing::debug!(consumer, label = %label, "consumer label truncated");
        }
        self.consumer = label;
        Ok(self)
    }

    pub fn with_consumer(mut self, consumer: &str) -> std::result::Result<Self, ConfigError> {
        self.set_consumer(consumer)?;
        Ok(self)
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Ask the kernel to buffer up to `size` edge events for the request.
    ///
    /// The kernel may round or clamp the value.
    pub fn set_event_buffer_size(&mut self, size: u32) -> std::result::Result<&mut Self, ConfigError> {
        let size = NonZeroU32::new(size).ok_or(ConfigError::ZeroEventBuffer)?;
        self.event_buffer_size = Some(size);
        Ok(self)
    }

    pub fn with_event_buffer_size(mut self, size: u32) -> std::result::Result<Self, ConfigError> {
        self.set_event_buffer_size(size)?;
        Ok(self)
    }

    /// `None` leaves the buffer size to the kernel.
    pub fn event_buffer_size(&self) -> Option<NonZeroU32> {
        self.event_buffer_size
    }

    /// Number of records an edge event reader for this request holds.
    pub(crate) fn reader_capacity(&self) -> usize {
        self.event_buffer_size
            .map(|size| size.get() as usize)
            .unwrap_or(DEFAULT_READER_CAPACITY)
            .min(GPIO_EVENT_BUFFER_MAX)
    }

    pub(crate) fn apply(&self, req: &mut gpio_line_request) {
        req.consumer = self.consumer.into_byte_array();
        req.event_buffer_size = self.event_buffer_size.map_or(0, NonZeroU32::get);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::SettingsConflict;
    use crate::line::settings::{Bias, Drive, EdgeDetect};

    fn attributes(config: &gpio_line_config) -> Vec<(LineAttribute, u64)> {
        config
            .attrs()
            .iter()
            .map(|a| (LineAttribute::from_v2(&a.attr).unwrap(), a.mask))
            .collect()
    }

    fn values(bits: u64) -> LineAttribute {
        LineAttribute::Values(MaskedBits::new(bits, u64::MAX))
    }

    #[test]
    fn default_only() {
        let lines = [3, 1, 2].as_line_set().unwrap();
        let config = LineConfig::new()
            .with_default(LineSettings::input().with_bias(Bias::PullDown))
            .finalize(&lines)
            .unwrap();

        assert_eq!(
            config.config.flags,
            (LineFlags::INPUT | LineFlags::BIAS_PULL_DOWN).bits()
        );
        assert_eq!(config.config.num_attrs, 0);
        assert_eq!(config.outputs, 0);
    }

    #[test]
    fn groups_follow_lowest_offset() {
        let lines = [7, 0, 5, 2].as_line_set().unwrap();
        let config = LineConfig::new()
            .with([2, 5], LineSettings::output(LineValue::Active))
            .unwrap()
            .with(5, LineSettings::output(LineValue::Inactive))
            .unwrap()
            .with(
                7,
                LineSettings::input()
                    .with_edge_detection(EdgeDetect::Rising)
                    .with_debounce_period(Duration::from_micros(10)),
            )
            .unwrap()
            .finalize(&lines)
            .unwrap();

        // offsets [0, 2, 5, 7] map to indices 0..4
        assert_eq!(config.config.flags, LineFlags::INPUT.bits());
        assert_eq!(config.outputs, 0b0110);
        assert_eq!(
            attributes(&config.config),
            vec![
                (LineAttribute::Flags(LineFlags::OUTPUT), 0b0110),
                (values(0b0010), 0b0110),
                (
                    LineAttribute::Flags(LineFlags::INPUT | LineFlags::EDGE_RISING),
                    0b1000
                ),
                (LineAttribute::Debounce(10), 0b1000),
            ]
        );
    }

    #[test]
    fn serialization_ignores_insertion_order() {
        let lines = [0, 1, 2, 3].as_line_set().unwrap();
        let out = LineSettings::output(LineValue::Active).with_drive(Drive::OpenDrain);
        let edge = LineSettings::input().with_edge_detection(EdgeDetect::Both);

        let a = LineConfig::new()
            .with(3, out)
            .unwrap()
            .with(1, edge)
            .unwrap()
            .finalize(&lines)
            .unwrap();
        let b = LineConfig::new()
            .with(1, edge)
            .unwrap()
            .with(3, out)
            .unwrap()
            .finalize(&lines)
            .unwrap();

        assert_eq!(a.config.flags, b.config.flags);
        assert_eq!(attributes(&a.config), attributes(&b.config));
    }

    #[test]
    fn decode_matches_effective_settings() {
        let lines = [0, 1, 4, 6, 9].as_line_set().unwrap();
        let config = LineConfig::new()
            .with_default(LineSettings::input().with_active_low(true))
            .with(1, LineSettings::output(LineValue::Active).with_bias(Bias::PullUp))
            .unwrap()
            .with(4, LineSettings::output(LineValue::Inactive).with_drive(Drive::OpenSource))
            .unwrap()
            .with(
                6,
                LineSettings::input()
                    .with_edge_detection(EdgeDetect::Falling)
                    .with_debounce_period(Duration::from_micros(250)),
            )
            .unwrap();

        let packed = config.finalize(&lines).unwrap();
        let decoded = decode_config(&packed.config, &lines).unwrap();

        assert_eq!(decoded.len(), lines.len());
        for (offset, settings) in decoded {
            let expected = config.settings_for(offset).resolve(offset).unwrap().effective();
            assert_eq!(settings, expected, "offset {offset}");
        }
    }

    #[test]
    fn override_outside_request() {
        let lines = [0, 1].as_line_set().unwrap();
        let config = LineConfig::new().with(4, LineSettings::input()).unwrap();

        assert_eq!(
            config.finalize(&lines).unwrap_err(),
            ConfigError::NotRequested(4)
        );
    }

    #[test]
    fn conflicts_name_the_offset() {
        let lines = [0, 1, 2].as_line_set().unwrap();
        let config = LineConfig::new()
            .with(
                2,
                LineSettings::output(LineValue::Active).with_edge_detection(EdgeDetect::Both),
            )
            .unwrap();

        assert_eq!(
            config.finalize(&lines).unwrap_err(),
            ConfigError::ConflictingSettings {
                offset: 2,
                conflict: SettingsConflict::EdgeOnOutput
            }
        );
    }

    #[test]
    fn unused_default_is_not_validated() {
        let lines = [0, 1].as_line_set().unwrap();
        let config = LineConfig::new()
            .with_default(LineSettings::input().with_drive(Drive::OpenDrain))
            .with([0, 1], LineSettings::output(LineValue::Inactive))
            .unwrap()
            .finalize(&lines)
            .unwrap();

        assert_eq!(config.config.flags, LineFlags::OUTPUT.bits());
        assert_eq!(attributes(&config.config), vec![(values(0), 0b11)]);
        assert_eq!(config.outputs, 0b11);
    }

    #[test]
    fn attribute_limit() {
        fn debounced(n: u32) -> LineConfig {
            let mut config = LineConfig::new();
            for offset in 0..n {
                let period = Duration::from_micros(u64::from(offset) + 1);
                config
                    .set(offset, LineSettings::input().with_debounce_period(period))
                    .unwrap();
            }
            config
        }

        let lines = (0..10).as_line_set().unwrap();
        let packed = debounced(10).finalize(&lines).unwrap();
        assert_eq!(packed.config.num_attrs, 10);

        let lines = (0..11).as_line_set().unwrap();
        assert_eq!(
            debounced(11).finalize(&lines).unwrap_err(),
            ConfigError::TooManyDistinctConfigs {
                required: 11,
                max: 10
            }
        );
    }

    #[test]
    fn remove_override() {
        let mut config = LineConfig::new();
        config.set([1, 2], LineSettings::output(LineValue::Active)).unwrap();

        assert_eq!(config.offsets().collect::<Vec<_>>(), vec![1, 2]);
        assert!(config.remove(1).is_some());
        assert!(config.remove(1).is_none());
        assert_eq!(config.settings_for(1), &LineSettings::default());
    }

    #[test]
    fn consumer_label() {
        let mut req = RequestConfig::new();
        assert_eq!(req.consumer(), "");

        req.set_consumer("watcher").unwrap();
        assert_eq!(req.consumer(), "watcher");

        let long = "x".repeat(40);
        req.set_consumer(&long).unwrap();
        assert_eq!(req.consumer().len(), 31);

        assert_eq!(
            req.set_consumer("bad\0label").unwrap_err(),
            ConfigError::InvalidConsumer
        );
    }

    #[test]
    fn event_buffer_size() {
        let mut req = RequestConfig::new();
        assert_eq!(req.event_buffer_size(), None);
        assert_eq!(req.reader_capacity(), DEFAULT_READER_CAPACITY);

        assert_eq!(
            req.set_event_buffer_size(0).unwrap_err(),
            ConfigError::ZeroEventBuffer
        );

        req.set_event_buffer_size(16).unwrap();
        assert_eq!(req.reader_capacity(), 16);

        req.set_event_buffer_size(5000).unwrap();
        assert_eq!(req.reader_capacity(), GPIO_EVENT_BUFFER_MAX);

        let mut raw = gpio_line_request::zeroed();
        req.apply(&mut raw);
        assert_eq!(raw.event_buffer_size, 5000);
    }
}
