//! TOML config file loading and validation for timing, schedule, valve
//! pins and panel inputs.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::debounce::DEFAULT_WINDOW;
use crate::inputs::InputKind;
use crate::schedule::ScheduleTarget;
use crate::sequencer::DEFAULT_DWELL;
use crate::valve::SprinklerIndex;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control-cycle period.
    pub tick_ms: i64,
    /// Heartbeat status snapshot period.
    pub status_interval_sec: i64,
    pub schedule: ScheduleEntry,
    pub timing: TimingEntry,
    pub clock: ClockEntry,
    pub valves: ValveEntry,
    pub inputs: InputsEntry,
    pub rain_intensity: Option<AdcEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleEntry {
    pub hour: i64,
    pub minute: i64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingEntry {
    pub dwell_sec: i64,
    pub debounce_ms: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClockEntry {
    /// Fixed offset from UTC; when absent the host offset is sampled at boot.
    pub utc_offset_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ValveEntry {
    /// BCM pins in ring order 0..=5.
    pub gpio_pins: Vec<i64>,
    pub active_low: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputsEntry {
    pub start: InputEntry,
    pub stop: InputEntry,
    pub manual: InputEntry,
    pub auto_enable: InputEntry,
    pub rain: InputEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputEntry {
    pub gpio_pin: i64,
    #[serde(default = "default_true")]
    pub active_low: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdcEntry {
    #[serde(default = "default_adc_address")]
    pub i2c_address: i64,
    pub channel: i64,
}

fn default_true() -> bool {
    true
}

fn default_adc_address() -> i64 {
    0x48
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            status_interval_sec: 60,
            schedule: ScheduleEntry::default(),
            timing: TimingEntry::default(),
            clock: ClockEntry::default(),
            valves: ValveEntry::default(),
            inputs: InputsEntry::default(),
            rain_intensity: None,
        }
    }
}

impl Default for ScheduleEntry {
    fn default() -> Self {
        Self { hour: 19, minute: 0 }
    }
}

impl Default for TimingEntry {
    fn default() -> Self {
        Self {
            dwell_sec: DEFAULT_DWELL.as_secs() as i64,
            debounce_ms: DEFAULT_WINDOW.as_millis() as i64,
        }
    }
}

impl Default for ValveEntry {
    fn default() -> Self {
        Self {
            gpio_pins: vec![5, 6, 13, 19, 26, 21],
            active_low: true,
        }
    }
}

impl Default for InputsEntry {
    fn default() -> Self {
        let pin = |gpio_pin| InputEntry {
            gpio_pin,
            active_low: true,
        };
        Self {
            start: pin(17),
            stop: pin(27),
            manual: pin(22),
            auto_enable: pin(23),
            rain: pin(24),
        }
    }
}

impl InputsEntry {
    pub fn get(&self, kind: InputKind) -> &InputEntry {
        match kind {
            InputKind::Start => &self.start,
            InputKind::Stop => &self.stop,
            InputKind::Manual => &self.manual,
            InputKind::AutoEnable => &self.auto_enable,
            InputKind::Rain => &self.rain,
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 28+ are not exposed on the standard header.
const VALID_GPIO_PINS: &[i64] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// `time::UtcOffset` range is +-25:59:59.
const MAX_OFFSET_MINUTES: i64 = 25 * 60 + 59;

/// ADS1115 ADDR pin strapping gives 0x48..=0x4B; AIN0..AIN3 single-ended.
const ADS1115_ADDRESSES: std::ops::RangeInclusive<i64> = 0x48..=0x4B;
const ADS1115_MAX_CHANNEL: i64 = 3;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_timing(&mut errors);
        self.validate_schedule(&mut errors);
        self.validate_pins(&mut errors);
        self.validate_adc(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        let t = &self.timing;

        if t.dwell_sec <= 0 {
            errors.push(format!("timing: dwell_sec must be positive, got {}", t.dwell_sec));
        }
        if t.debounce_ms <= 0 {
            errors.push(format!(
                "timing: debounce_ms must be positive, got {}",
                t.debounce_ms
            ));
        }
        if self.tick_ms <= 0 {
            errors.push(format!("tick_ms must be positive, got {}", self.tick_ms));
        } else if t.debounce_ms > 0 && self.tick_ms >= t.debounce_ms {
            errors.push(format!(
                "tick_ms ({}) must be shorter than debounce_ms ({})",
                self.tick_ms, t.debounce_ms
            ));
        }
        if self.status_interval_sec <= 0 {
            errors.push(format!(
                "status_interval_sec must be positive, got {}",
                self.status_interval_sec
            ));
        }
    }

    fn validate_schedule(&self, errors: &mut Vec<String>) {
        let s = &self.schedule;

        if !(0..=23).contains(&s.hour) {
            errors.push(format!("schedule: hour {} out of range [0, 23]", s.hour));
        }
        if !(0..=59).contains(&s.minute) {
            errors.push(format!("schedule: minute {} out of range [0, 59]", s.minute));
        }
        if let Some(off) = self.clock.utc_offset_minutes {
            if off.abs() > MAX_OFFSET_MINUTES {
                errors.push(format!(
                    "clock: utc_offset_minutes {off} out of range [-{MAX_OFFSET_MINUTES}, {MAX_OFFSET_MINUTES}]"
                ));
            }
        }
    }

    fn validate_pins(&self, errors: &mut Vec<String>) {
        let mut seen_pins: HashSet<i64> = HashSet::new();

        // ── Valves ──────────────────────────────────────────
        if self.valves.gpio_pins.len() != SprinklerIndex::COUNT {
            errors.push(format!(
                "valves: exactly {} gpio_pins required, got {}",
                SprinklerIndex::COUNT,
                self.valves.gpio_pins.len()
            ));
        }
        for (i, pin) in self.valves.gpio_pins.iter().enumerate() {
            check_pin(&format!("valve {i}"), *pin, &mut seen_pins, errors);
        }

        // ── Panel inputs ────────────────────────────────────
        for kind in InputKind::ALL {
            let entry = self.inputs.get(kind);
            check_pin(&format!("input '{kind}'"), entry.gpio_pin, &mut seen_pins, errors);
        }
    }

    fn validate_adc(&self, errors: &mut Vec<String>) {
        let Some(adc) = &self.rain_intensity else {
            return;
        };
        if !ADS1115_ADDRESSES.contains(&adc.i2c_address) {
            errors.push(format!(
                "rain_intensity: i2c_address {:#04x} is not an ADS1115 address (0x48-0x4b)",
                adc.i2c_address
            ));
        }
        if !(0..=ADS1115_MAX_CHANNEL).contains(&adc.channel) {
            errors.push(format!(
                "rain_intensity: channel {} out of range [0, {ADS1115_MAX_CHANNEL}]",
                adc.channel
            ));
        }
    }

    // -- Typed accessors (valid only after `validate`) ----------------------

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms as u64)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_sec as u64)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.timing.dwell_sec as u64)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.timing.debounce_ms as u64)
    }

    pub fn schedule_target(&self) -> Result<ScheduleTarget> {
        let (h, m) = (self.schedule.hour, self.schedule.minute);
        ScheduleTarget::new(h as u8, m as u8)
            .with_context(|| format!("invalid schedule time {h}:{m}"))
    }

    pub fn utc_offset_minutes(&self) -> Option<i32> {
        self.clock.utc_offset_minutes.map(|m| m as i32)
    }

    /// Per-input polarity, indexed by [`InputKind::index`].
    pub fn active_low(&self) -> [bool; InputKind::COUNT] {
        InputKind::ALL.map(|kind| self.inputs.get(kind).active_low)
    }

    #[cfg_attr(not(feature = "gpio"), allow(dead_code))]
    pub fn valve_pins(&self) -> Result<[u8; SprinklerIndex::COUNT]> {
        let pins: Vec<u8> = self.valves.gpio_pins.iter().map(|p| *p as u8).collect();
        pins.try_into()
            .map_err(|v: Vec<u8>| anyhow::anyhow!("expected {} valve pins, got {}", SprinklerIndex::COUNT, v.len()))
    }
}

fn check_pin(ctx: &str, pin: i64, seen: &mut HashSet<i64>, errors: &mut Vec<String>) {
    if !VALID_GPIO_PINS.contains(&pin) {
        errors.push(format!(
            "{ctx}: gpio_pin {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
        ));
    } else if !seen.insert(pin) {
        errors.push(format!("{ctx}: gpio_pin {pin} is already in use"));
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file. A missing file yields the
/// built-in defaults.
pub fn load(path: &str) -> Result<Config> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
        tracing::info!(path, "config loaded");
        config
    } else {
        tracing::warn!(path, "config file not found, using defaults");
        Config::default()
    };

    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
