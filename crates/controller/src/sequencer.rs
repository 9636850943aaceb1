//! Six-valve rotation with a fixed dwell per valve.
//!
//! The sequencer is the only writer of the valve lines. Every open goes
//! through [`Sequencer::open`], which closes the previous valve first, so at
//! most one valve is ever open.
//!
//! ```text
//! open(0) ──dwell──▶ 1 ──dwell──▶ 2 ── … ──▶ 5 ──dwell──▶ Completed (all closed)
//! ```

use std::time::Duration;

use tracing::info;

use crate::valve::{SprinklerIndex, ValveLines};

/// Default time each valve stays open during an automatic cycle.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(60 * 60);

/// Outcome of [`Sequencer::advance_if_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerAction {
    None,
    Advanced(SprinklerIndex),
    /// The ring wrapped back to valve 0; everything is closed.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenValve {
    index: SprinklerIndex,
    since: Duration,
}

pub struct Sequencer<V> {
    valves: V,
    open: Option<OpenValve>,
    dwell: Duration,
}

impl<V: ValveLines> Sequencer<V> {
    /// Takes ownership of the valve lines and drives every valve closed.
    pub fn new(valves: V, dwell: Duration) -> Self {
        let mut seq = Self {
            valves,
            open: None,
            dwell,
        };
        seq.close_all();
        seq
    }

    pub fn current(&self) -> Option<SprinklerIndex> {
        self.open.map(|o| o.index)
    }

    /// Uptime at which the current valve was opened.
    pub fn opened_at(&self) -> Option<Duration> {
        self.open.map(|o| o.since)
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Close whatever is open, then open `index` at `now`.
    pub fn open(&mut self, index: SprinklerIndex, now: Duration) {
        if let Some(prev) = self.open.take() {
            self.valves.set(prev.index, false);
        }
        self.valves.set(index, true);
        self.open = Some(OpenValve { index, since: now });
        info!(valve = %index, "valve opened");
    }

    /// Move to the next valve once the dwell has elapsed. Wrapping to
    /// valve 0 ends the cycle instead of reopening it.
    pub fn advance_if_due(&mut self, now: Duration) -> SequencerAction {
        let Some(current) = self.open else {
            return SequencerAction::None;
        };
        if now.saturating_sub(current.since) < self.dwell {
            return SequencerAction::None;
        }

        let next = current.index.next();
        if next == SprinklerIndex::FIRST {
            self.valves.set(current.index, false);
            self.open = None;
            info!(valve = %current.index, "last valve closed, ring complete");
            SequencerAction::Completed
        } else {
            self.open(next, now);
            SequencerAction::Advanced(next)
        }
    }

    /// Close every valve, not just the tracked one.
    pub fn close_all(&mut self) {
        for valve in SprinklerIndex::all() {
            self.valves.set(valve, false);
        }
        if let Some(prev) = self.open.take() {
            info!(valve = %prev.index, "valve closed");
        }
    }

    #[cfg(test)]
    pub(crate) fn valves(&self) -> &V {
        &self.valves
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valve::MockValves;

    const DWELL: Duration = Duration::from_secs(10);

    fn seq() -> Sequencer<MockValves> {
        Sequencer::new(MockValves::new(), DWELL)
    }

    fn v(i: usize) -> SprinklerIndex {
        SprinklerIndex::new(i).unwrap()
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    // -- open / close_all ---------------------------------------------------

    #[test]
    fn new_closes_every_valve() {
        let seq = seq();
        assert_eq!(seq.valves().open_count(), 0);
        assert_eq!(seq.valves().writes, SprinklerIndex::COUNT);
        assert_eq!(seq.current(), None);
    }

    #[test]
    fn open_replaces_previous_valve() {
        let mut seq = seq();
        seq.open(v(2), secs(0));
        seq.open(v(4), secs(1));
        assert_eq!(seq.valves().open_valve(), Some(v(4)));
        assert_eq!(seq.current(), Some(v(4)));
        assert_eq!(seq.opened_at(), Some(secs(1)));
    }

    #[test]
    fn close_all_clears_state() {
        let mut seq = seq();
        seq.open(v(3), secs(0));
        seq.close_all();
        assert_eq!(seq.valves().open_count(), 0);
        assert_eq!(seq.current(), None);
        assert_eq!(seq.advance_if_due(secs(1000)), SequencerAction::None);
    }

    // -- advance_if_due -----------------------------------------------------

    #[test]
    fn nothing_open_is_none() {
        let mut seq = seq();
        assert_eq!(seq.advance_if_due(secs(100)), SequencerAction::None);
    }

    #[test]
    fn before_dwell_is_none() {
        let mut seq = seq();
        seq.open(v(0), secs(5));
        assert_eq!(seq.advance_if_due(secs(14)), SequencerAction::None);
        assert_eq!(seq.current(), Some(v(0)));
    }

    #[test]
    fn at_dwell_advances_and_restarts_timer() {
        let mut seq = seq();
        seq.open(v(0), secs(5));
        assert_eq!(seq.advance_if_due(secs(15)), SequencerAction::Advanced(v(1)));
        assert_eq!(seq.opened_at(), Some(secs(15)));
        assert_eq!(seq.advance_if_due(secs(24)), SequencerAction::None);
    }

    #[test]
    fn full_ring_visits_all_valves_then_completes() {
        let mut seq = seq();
        seq.open(v(0), secs(0));
        let mut visited = vec![0];

        for step in 1..=SprinklerIndex::COUNT as u64 {
            let action = seq.advance_if_due(DWELL * step as u32);
            assert!(seq.valves().open_count() <= 1);
            match action {
                SequencerAction::Advanced(next) => visited.push(next.get()),
                SequencerAction::Completed => {
                    assert_eq!(step, SprinklerIndex::COUNT as u64);
                }
                SequencerAction::None => panic!("dwell elapsed but nothing happened at step {step}"),
            }
        }

        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(seq.valves().open_count(), 0);
        assert_eq!(seq.current(), None);
    }

    #[test]
    fn started_mid_ring_completes_at_wrap() {
        let mut seq = seq();
        seq.open(v(4), secs(0));
        assert_eq!(seq.advance_if_due(secs(10)), SequencerAction::Advanced(v(5)));
        assert_eq!(seq.advance_if_due(secs(20)), SequencerAction::Completed);
        assert_eq!(seq.valves().open_count(), 0);
    }

    #[test]
    fn late_poll_still_advances_one_step() {
        let mut seq = seq();
        seq.open(v(0), secs(0));
        // Polled long after several dwells: only one step per call.
        assert_eq!(seq.advance_if_due(secs(45)), SequencerAction::Advanced(v(1)));
        assert_eq!(seq.current(), Some(v(1)));
    }
}
