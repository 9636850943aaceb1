//! Front-panel inputs: three buttons, the automatic-enable switch and the
//! rain sensor, each behind its own debouncer.
//!
//! Buttons are edge-triggered: a request is reported only on the cycle
//! where the stable level turns active, so holding a button does not
//! retrigger. A button only reports presses after it has been seen
//! released once, so a line stuck active at power-up never counts as a
//! press. The enable switch and rain switch are level-triggered.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::debounce::DebouncedSignal;
use crate::error::{Fault, IoError};

// ---------------------------------------------------------------------------
// Input identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Start,
    Stop,
    Manual,
    AutoEnable,
    Rain,
}

impl InputKind {
    pub const COUNT: usize = 5;
    pub const ALL: [InputKind; Self::COUNT] = [
        Self::Start,
        Self::Stop,
        Self::Manual,
        Self::AutoEnable,
        Self::Rain,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Momentary buttons are edge-triggered; the switches are not.
    pub fn is_button(self) -> bool {
        matches!(self, Self::Start | Self::Stop | Self::Manual)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Manual => "manual",
            Self::AutoEnable => "auto_enable",
            Self::Rain => "rain",
        }
    }

    /// Accepts the config/command name, plus `auto` for the enable switch.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "manual" => Some(Self::Manual),
            "auto" | "auto_enable" => Some(Self::AutoEnable),
            "rain" => Some(Self::Rain),
            _ => None,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Hardware seam
// ---------------------------------------------------------------------------

/// Raw access to the panel lines. Levels are electrical (`true` = HIGH);
/// polarity is applied by the [`InputBank`].
pub trait InputLines {
    /// Called once at the start of every sampling cycle.
    fn refresh(&mut self, _now: Duration) {}

    fn read_level(&mut self, input: InputKind) -> Result<bool, IoError>;

    /// Advisory analog rain intensity. Not used for any decision.
    fn read_rain_intensity(&mut self) -> Result<u16, IoError>;
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Stable view of the panel for one control cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pub start_requested: bool,
    pub stop_requested: bool,
    pub manual_requested: bool,
    pub auto_enabled: bool,
    pub raining: bool,
    pub rain_intensity: Option<u16>,
    /// Lines that started failing on this cycle.
    pub faults: Vec<Fault>,
}

// ---------------------------------------------------------------------------
// Input bank
// ---------------------------------------------------------------------------

struct Channel {
    signal: DebouncedSignal,
    active_low: bool,
    failing: bool,
    /// Edges count only once the line has read inactive.
    armed: bool,
}

impl Channel {
    fn active_level(&self) -> bool {
        !self.active_low
    }

    fn is_active(&self) -> bool {
        self.signal.level() == self.active_level()
    }
}

pub struct InputBank<L> {
    lines: L,
    channels: [Channel; InputKind::COUNT],
}

impl<L: InputLines> InputBank<L> {
    /// `active_low[kind.index()]` gives each input's polarity.
    pub fn new(lines: L, window: Duration, active_low: [bool; InputKind::COUNT]) -> Self {
        let channels = InputKind::ALL.map(|kind| {
            let active_low = active_low[kind.index()];
            let active_level = !active_low;
            // Rain reads as "raining" until the sensor has settled once.
            let idle_level = if kind == InputKind::Rain {
                active_level
            } else {
                !active_level
            };
            Channel {
                signal: DebouncedSignal::new(idle_level, window),
                active_low,
                failing: false,
                armed: !kind.is_button(),
            }
        });

        Self { lines, channels }
    }

    /// Sample every line once and build this cycle's snapshot.
    pub fn sample_all(&mut self, now: Duration) -> InputSnapshot {
        self.lines.refresh(now);

        let mut snapshot = InputSnapshot::default();
        for kind in InputKind::ALL {
            let activated = self.sample_one(kind, now, &mut snapshot.faults);
            match kind {
                InputKind::Start => snapshot.start_requested = activated,
                InputKind::Stop => snapshot.stop_requested = activated,
                InputKind::Manual => snapshot.manual_requested = activated,
                InputKind::AutoEnable | InputKind::Rain => {}
            }
        }

        snapshot.auto_enabled = self.channels[InputKind::AutoEnable.index()].is_active();
        snapshot.raining = self.channels[InputKind::Rain.index()].is_active();
        snapshot.rain_intensity = match self.lines.read_rain_intensity() {
            Ok(v) => Some(v),
            Err(IoError::Unsupported) => None,
            Err(e) => {
                debug!("rain intensity unavailable: {e}");
                None
            }
        };

        snapshot
    }

    /// Returns true when the line turned active on this sample.
    fn sample_one(&mut self, kind: InputKind, now: Duration, faults: &mut Vec<Fault>) -> bool {
        let channel = &mut self.channels[kind.index()];

        match self.lines.read_level(kind) {
            Ok(raw) => {
                if channel.failing {
                    channel.failing = false;
                    info!(input = %kind, "input line recovered");
                }
                let s = channel.signal.sample(raw, now);
                let activated = s.transitioned && s.level == channel.active_level();
                if !channel.armed {
                    if raw != channel.active_level() {
                        channel.armed = true;
                    } else if activated {
                        warn!(input = %kind, "held active since start-up, ignored until released");
                    }
                }
                activated && channel.armed
            }
            Err(e) => {
                if !channel.failing {
                    channel.failing = true;
                    warn!(input = %kind, "holding last stable level: {e}");
                    faults.push(Fault::InputReadFailure(kind));
                }
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Input lines whose electrical levels are set directly by the test.
    pub(crate) struct ScriptedLines {
        pub(crate) levels: [bool; InputKind::COUNT],
        pub(crate) failing: [bool; InputKind::COUNT],
        pub(crate) intensity: Option<u16>,
    }

    impl ScriptedLines {
        /// Every line idle (HIGH) for an all-active-low panel, rain dry.
        pub(crate) fn idle() -> Self {
            Self {
                levels: [true; InputKind::COUNT],
                failing: [false; InputKind::COUNT],
                intensity: None,
            }
        }

        pub(crate) fn set(&mut self, kind: InputKind, high: bool) {
            self.levels[kind.index()] = high;
        }
    }

    impl InputLines for ScriptedLines {
        fn read_level(&mut self, input: InputKind) -> Result<bool, IoError> {
            if self.failing[input.index()] {
                Err(IoError::ReadFailed(input))
            } else {
                Ok(self.levels[input.index()])
            }
        }

        fn read_rain_intensity(&mut self) -> Result<u16, IoError> {
            self.intensity.ok_or(IoError::Unsupported)
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn bank() -> InputBank<ScriptedLines> {
        InputBank::new(ScriptedLines::idle(), ms(50), [true; InputKind::COUNT])
    }

    /// Sample every 10ms over `[from, to)` and collect the snapshots.
    fn run(bank: &mut InputBank<ScriptedLines>, from: u64, to: u64) -> Vec<InputSnapshot> {
        (from..to).step_by(10).map(|t| bank.sample_all(ms(t))).collect()
    }

    // -- Buttons ------------------------------------------------------------

    #[test]
    fn idle_panel_requests_nothing() {
        let mut bank = bank();
        for s in run(&mut bank, 0, 500) {
            assert!(!s.start_requested && !s.stop_requested && !s.manual_requested);
        }
    }

    #[test]
    fn held_button_requests_once() {
        let mut bank = bank();
        run(&mut bank, 0, 100);
        bank.lines_mut().set(InputKind::Manual, false); // pressed (active-low)
        let snaps = run(&mut bank, 100, 2000);
        let edges = snaps.iter().filter(|s| s.manual_requested).count();
        assert_eq!(edges, 1);
    }

    #[test]
    fn release_is_not_a_request() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::Start, false);
        run(&mut bank, 0, 200);
        bank.lines_mut().set(InputKind::Start, true);
        let snaps = run(&mut bank, 200, 500);
        assert!(snaps.iter().all(|s| !s.start_requested));
    }

    #[test]
    fn short_glitch_is_filtered() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::Stop, false);
        let mut snaps = run(&mut bank, 0, 30);
        bank.lines_mut().set(InputKind::Stop, true);
        snaps.extend(run(&mut bank, 30, 300));
        assert!(snaps.iter().all(|s| !s.stop_requested));
    }

    #[test]
    fn active_high_polarity() {
        let mut lines = ScriptedLines::idle();
        lines.levels = [false; InputKind::COUNT];
        let mut bank = InputBank::new(lines, ms(50), [false; InputKind::COUNT]);
        run(&mut bank, 0, 100);
        bank.lines_mut().set(InputKind::Start, true);
        let snaps = run(&mut bank, 100, 300);
        assert_eq!(snaps.iter().filter(|s| s.start_requested).count(), 1);
    }

    #[test]
    fn button_held_from_power_up_is_not_a_press() {
        let mut lines = ScriptedLines::idle();
        lines.set(InputKind::Start, false); // active-low, stuck pressed
        lines.set(InputKind::Manual, false);
        let mut bank = InputBank::new(lines, ms(50), [true; InputKind::COUNT]);
        let snaps = run(&mut bank, 0, 2000);
        assert!(snaps.iter().all(|s| !s.start_requested && !s.manual_requested));
    }

    #[test]
    fn button_held_from_power_up_presses_after_release() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::Start, false);
        run(&mut bank, 0, 300);
        bank.lines_mut().set(InputKind::Start, true);
        run(&mut bank, 300, 500);
        bank.lines_mut().set(InputKind::Start, false);
        let snaps = run(&mut bank, 500, 800);
        assert_eq!(snaps.iter().filter(|s| s.start_requested).count(), 1);
    }

    // -- Level-triggered switches -------------------------------------------

    #[test]
    fn enable_switch_is_level_triggered() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::AutoEnable, false); // enabled
        let snaps = run(&mut bank, 0, 500);
        let enabled = snaps.iter().filter(|s| s.auto_enabled).count();
        // Every sample after the window settles reports enabled.
        assert!(enabled >= snaps.len() - 6, "enabled on {enabled} samples");
        assert!(snaps.last().is_some_and(|s| s.auto_enabled));
    }

    #[test]
    fn rain_reads_raining_until_settled() {
        let mut bank = bank();
        let first = bank.sample_all(ms(0));
        assert!(first.raining);
        let snaps = run(&mut bank, 10, 200);
        assert!(snaps.last().is_some_and(|s| !s.raining));
    }

    #[test]
    fn rain_active_stays_raining() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::Rain, false); // wet
        let snaps = run(&mut bank, 0, 300);
        assert!(snaps.iter().all(|s| s.raining));
    }

    // -- Faults -------------------------------------------------------------

    #[test]
    fn read_failure_freezes_level_and_reports_once() {
        let mut bank = bank();
        bank.lines_mut().set(InputKind::AutoEnable, false);
        run(&mut bank, 0, 200);

        bank.lines_mut().failing[InputKind::AutoEnable.index()] = true;
        bank.lines_mut().set(InputKind::AutoEnable, true); // would disable if read
        let snaps = run(&mut bank, 200, 500);

        assert!(snaps.iter().all(|s| s.auto_enabled), "level must stay frozen");
        let faults: Vec<_> = snaps.iter().flat_map(|s| s.faults.iter()).collect();
        assert_eq!(faults, vec![&Fault::InputReadFailure(InputKind::AutoEnable)]);
    }

    #[test]
    fn failing_button_never_requests() {
        let mut bank = bank();
        bank.lines_mut().failing[InputKind::Stop.index()] = true;
        bank.lines_mut().set(InputKind::Stop, false);
        let snaps = run(&mut bank, 0, 300);
        assert!(snaps.iter().all(|s| !s.stop_requested));
    }

    #[test]
    fn recovered_line_resumes_sampling() {
        let mut bank = bank();
        bank.lines_mut().failing[InputKind::Start.index()] = true;
        run(&mut bank, 0, 100);
        bank.lines_mut().failing[InputKind::Start.index()] = false;
        run(&mut bank, 100, 200);
        bank.lines_mut().set(InputKind::Start, false);
        let snaps = run(&mut bank, 200, 400);
        assert_eq!(snaps.iter().filter(|s| s.start_requested).count(), 1);
    }

    // -- Rain intensity -----------------------------------------------------

    #[test]
    fn rain_intensity_is_passed_through() {
        let mut bank = bank();
        bank.lines_mut().intensity = Some(512);
        assert_eq!(bank.sample_all(ms(0)).rain_intensity, Some(512));
    }

    #[test]
    fn missing_adc_gives_no_intensity() {
        let mut bank = bank();
        assert_eq!(bank.sample_all(ms(0)).rain_intensity, None);
    }

    // -- Names --------------------------------------------------------------

    #[test]
    fn only_momentary_inputs_are_buttons() {
        let buttons: Vec<_> = InputKind::ALL.into_iter().filter(|k| k.is_button()).collect();
        assert_eq!(buttons, vec![InputKind::Start, InputKind::Stop, InputKind::Manual]);
    }

    #[test]
    fn from_name_accepts_aliases() {
        assert_eq!(InputKind::from_name("auto"), Some(InputKind::AutoEnable));
        assert_eq!(InputKind::from_name("RAIN"), Some(InputKind::Rain));
        assert_eq!(InputKind::from_name("pump"), None);
    }
}
