//! Irrigation controller: arbitrates the daily schedule, the panel buttons
//! and the stop command, and drives the sequencer.
//!
//! ## State machine
//!
//! ```text
//!            start edge / schedule due
//!  Idle ─────────────────────────────▶ AutomaticCycle ──ring complete──▶ Idle
//!   │ ▲                                   │   ▲
//!   │ └──────────── stop edge ────────────┘   └─ manual edge: next valve
//!   │ manual edge
//!   ▼
//!  ManualCycle ◀─ manual edge: next valve (wraps, never completes)
//! ```
//!
//! Each cycle is evaluated in a fixed order: stop, manual, start/schedule,
//! sequencer advance. A stop edge ends evaluation for that cycle.

use std::time::Duration;

use time::PrimitiveDateTime;
use tracing::{info, warn};

use crate::error::{ClockError, Fault};
use crate::inputs::InputSnapshot;
use crate::schedule::{ScheduleTarget, ScheduleTracker};
use crate::sequencer::{Sequencer, SequencerAction};
use crate::status::{EventKind, EventLog, StatusSnapshot};
use crate::valve::{SprinklerIndex, ValveLines};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// Full ring 0..=5 with the fixed dwell, then back to Idle.
    AutomaticCycle { started_at: Duration },
    /// Operator-stepped; only stop or another manual press changes valves.
    ManualCycle { started_at: Duration },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AutomaticCycle { .. } => "automatic",
            Self::ManualCycle { .. } => "manual",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Uptime at which the current cycle began.
    pub fn started_at(&self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::AutomaticCycle { started_at } | Self::ManualCycle { started_at } => {
                Some(*started_at)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller<V> {
    mode: Mode,
    sequencer: Sequencer<V>,
    schedule: ScheduleTracker,
    /// Survives stops so manual starts keep rotating through the ring.
    last_valve: Option<SprinklerIndex>,
    clock_fault: bool,
    /// Advisory only; never gates a decision.
    rain_intensity: Option<u16>,
    events: EventLog,
}

impl<V: ValveLines> Controller<V> {
    pub fn new(valves: V, dwell: Duration, target: ScheduleTarget) -> Self {
        let sequencer = Sequencer::new(valves, dwell);
        info!(dwell_secs = sequencer.dwell().as_secs(), %target, "controller ready");
        Self {
            mode: Mode::Idle,
            sequencer,
            schedule: ScheduleTracker::new(target),
            last_valve: None,
            clock_fault: false,
            rain_intensity: None,
            events: EventLog::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn open_valve(&self) -> Option<SprinklerIndex> {
        self.sequencer.current()
    }

    pub fn next_watering(&self) -> Option<PrimitiveDateTime> {
        self.schedule.next()
    }

    /// Seed the schedule from the calibrated clock at start-up.
    pub fn seed_schedule(&mut self, now: Duration, wall: Result<PrimitiveDateTime, ClockError>) {
        self.track_clock(now, wall);
        if self.schedule.seed(wall).is_ok() {
            self.record_next_watering(now);
        }
    }

    /// One control cycle.
    pub fn tick(
        &mut self,
        inputs: &InputSnapshot,
        now: Duration,
        wall: Result<PrimitiveDateTime, ClockError>,
    ) {
        self.rain_intensity = inputs.rain_intensity;
        for fault in &inputs.faults {
            self.events.push(now, EventKind::Fault, fault.to_string());
        }
        self.track_clock(now, wall);

        if self.schedule.next().is_none() && wall.is_ok() && self.schedule.seed(wall).is_ok() {
            self.record_next_watering(now);
        }

        if inputs.stop_requested {
            self.halt(now, wall, "stop button");
            return;
        }

        if inputs.manual_requested {
            self.manual_step(now);
        }

        if inputs.start_requested {
            self.start_automatic(now, "start button");
        } else if self.mode.is_idle() && self.automatic_start_due(inputs, wall) {
            self.start_automatic(now, "schedule");
        }

        if matches!(self.mode, Mode::AutomaticCycle { .. }) {
            match self.sequencer.advance_if_due(now) {
                SequencerAction::None => {}
                SequencerAction::Advanced(valve) => {
                    self.last_valve = Some(valve);
                    self.events
                        .push(now, EventKind::Valve, format!("valve {valve} opened"));
                }
                SequencerAction::Completed => {
                    let minutes = self
                        .mode
                        .started_at()
                        .map_or(0, |t| now.saturating_sub(t).as_secs() / 60);
                    self.set_mode(now, Mode::Idle, "ring complete");
                    info!(minutes, "automatic cycle finished");
                    self.reschedule(now, wall);
                }
            }
        }
    }

    /// Close everything and go idle without touching the schedule.
    pub fn shutdown(&mut self, now: Duration) {
        self.sequencer.close_all();
        self.set_mode(now, Mode::Idle, "shutdown");
    }

    pub fn status(&self, now: Duration) -> StatusSnapshot {
        StatusSnapshot {
            uptime_secs: now.as_secs(),
            mode: self.mode.name(),
            cycle_secs: self
                .mode
                .started_at()
                .map(|t| now.saturating_sub(t).as_secs()),
            open_valve: self.sequencer.current().map(SprinklerIndex::get),
            valve_open_secs: self
                .sequencer
                .opened_at()
                .map(|t| now.saturating_sub(t).as_secs()),
            last_valve: self.last_valve.map(SprinklerIndex::get),
            schedule_target: self.schedule.target().to_string(),
            next_watering: self.schedule.next().map(|n| n.to_string()),
            rain_intensity: self.rain_intensity,
            events: StatusSnapshot::recent_events(&self.events),
        }
    }

    // -- Transitions --------------------------------------------------------

    fn halt(&mut self, now: Duration, wall: Result<PrimitiveDateTime, ClockError>, reason: &str) {
        self.sequencer.close_all();
        self.set_mode(now, Mode::Idle, reason);
        self.reschedule(now, wall);
    }

    /// Manual press: from Idle start a manual cycle on the valve after the
    /// last one used; while running, step to the next valve (5 wraps to 0).
    fn manual_step(&mut self, now: Duration) {
        let next = self
            .sequencer
            .current()
            .or(self.last_valve)
            .map_or(SprinklerIndex::FIRST, SprinklerIndex::next);

        if self.mode.is_idle() {
            self.sequencer.close_all();
            self.sequencer.open(next, now);
            self.set_mode(now, Mode::ManualCycle { started_at: now }, "manual button");
        } else {
            self.sequencer.open(next, now);
        }

        self.last_valve = Some(next);
        self.events
            .push(now, EventKind::Valve, format!("valve {next} opened (manual)"));
    }

    fn start_automatic(&mut self, now: Duration, reason: &str) {
        self.sequencer.close_all();
        self.sequencer.open(SprinklerIndex::FIRST, now);
        self.last_valve = Some(SprinklerIndex::FIRST);
        self.set_mode(now, Mode::AutomaticCycle { started_at: now }, reason);
    }

    fn automatic_start_due(
        &self,
        inputs: &InputSnapshot,
        wall: Result<PrimitiveDateTime, ClockError>,
    ) -> bool {
        !inputs.raining && inputs.auto_enabled && wall.is_ok_and(|w| self.schedule.is_due(w))
    }

    fn set_mode(&mut self, now: Duration, mode: Mode, reason: &str) {
        let from = self.mode.name();
        self.mode = mode;
        info!(from, to = mode.name(), reason, "mode change");
        self.events.push(
            now,
            EventKind::Mode,
            format!("{from} -> {} ({reason})", mode.name()),
        );
    }

    // -- Schedule / clock ---------------------------------------------------

    fn reschedule(&mut self, now: Duration, wall: Result<PrimitiveDateTime, ClockError>) {
        if self.schedule.reschedule(wall).is_ok() {
            self.record_next_watering(now);
        }
    }

    fn record_next_watering(&mut self, now: Duration) {
        if let Some(next) = self.schedule.next() {
            self.events
                .push(now, EventKind::Schedule, format!("next watering {next}"));
        }
    }

    /// Log clock loss and recovery once each, not every cycle.
    fn track_clock(&mut self, now: Duration, wall: Result<PrimitiveDateTime, ClockError>) {
        match (wall, self.clock_fault) {
            (Err(e), false) => {
                self.clock_fault = true;
                warn!("{e}; automatic starts withheld");
                self.events
                    .push(now, EventKind::Fault, Fault::from(e).to_string());
            }
            (Ok(_), true) => {
                self.clock_fault = false;
                info!("wall clock available again");
            }
            _ => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn valves(&self) -> &V {
        self.sequencer.valves()
    }

    #[cfg(test)]
    pub(crate) fn events(&self) -> &EventLog {
        &self.events
    }
}

// ===========================================================================
// Tests
// ===========================================================================
