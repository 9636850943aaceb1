//! Sprinkler valves: the ring index type and the output drivers.
//!
//! The `gpio` feature gates the real rppal driver; without it, an
//! in-memory board stands in and logs state changes.

use std::fmt;

#[cfg(feature = "gpio")]
use anyhow::Result;
#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

// ---------------------------------------------------------------------------
// Ring index
// ---------------------------------------------------------------------------

/// One of the six valves, in ring order 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SprinklerIndex(u8);

impl SprinklerIndex {
    pub const COUNT: usize = 6;
    pub const FIRST: Self = Self(0);

    #[cfg(test)]
    pub fn new(index: usize) -> Option<Self> {
        (index < Self::COUNT).then(|| Self(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Next valve in ring order; 5 wraps to 0.
    pub fn next(self) -> Self {
        Self((self.0 + 1) % Self::COUNT as u8)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl fmt::Display for SprinklerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Output seam
// ---------------------------------------------------------------------------

/// Valve output lines. `open` is logical; drivers apply relay polarity.
pub trait ValveLines {
    fn set(&mut self, valve: SprinklerIndex, open: bool);
}

// ---------------------------------------------------------------------------
// Real GPIO valve board (production; requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub struct GpioValves {
    pins: Vec<OutputPin>, // ring index -> relay pin
    active_low: bool,     // many relay boards are active-low
}

#[cfg(feature = "gpio")]
impl GpioValves {
    /// `gpio_pins[i]` drives valve `i`. Every relay starts closed.
    pub fn new(gpio_pins: &[u8; SprinklerIndex::COUNT], active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = Vec::with_capacity(SprinklerIndex::COUNT);

        for pin_num in gpio_pins {
            let mut pin = gpio.get(*pin_num)?.into_output();
            // Fail-safe: ensure "closed" at startup
            if active_low {
                pin.set_high();
            } else {
                pin.set_low();
            }
            pins.push(pin);
        }

        tracing::info!(?gpio_pins, active_low, "valve board initialised");
        Ok(Self { pins, active_low })
    }
}

#[cfg(feature = "gpio")]
impl ValveLines for GpioValves {
    fn set(&mut self, valve: SprinklerIndex, open: bool) {
        let pin = &mut self.pins[valve.get()];
        // active-low relay: LOW = open, HIGH = closed
        if open != self.active_low {
            pin.set_high();
        } else {
            pin.set_low();
        }
        debug!(%valve, open, "relay written");
    }
}

// ---------------------------------------------------------------------------
// Mock valve board (development and tests; no hardware)
// ---------------------------------------------------------------------------
#[cfg(any(test, not(feature = "gpio")))]
pub struct MockValves {
    pub(crate) open: [bool; SprinklerIndex::COUNT],
    pub(crate) writes: usize,
}

#[cfg(any(test, not(feature = "gpio")))]
impl MockValves {
    pub fn new() -> Self {
        tracing::info!("[mock-gpio] valve board initialised (no hardware)");
        Self {
            open: [false; SprinklerIndex::COUNT],
            writes: 0,
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.iter().filter(|o| **o).count()
    }

    /// The single open valve, if exactly one is open.
    #[cfg(test)]
    pub fn open_valve(&self) -> Option<SprinklerIndex> {
        let mut open = SprinklerIndex::all().filter(|v| self.open[v.get()]);
        match (open.next(), open.next()) {
            (Some(v), None) => Some(v),
            _ => None,
        }
    }
}

#[cfg(any(test, not(feature = "gpio")))]
impl ValveLines for MockValves {
    fn set(&mut self, valve: SprinklerIndex, open: bool) {
        self.open[valve.get()] = open;
        self.writes += 1;
        debug!(
            %valve,
            open_now = self.open_count(),
            writes = self.writes,
            "[mock-gpio] valve set {}",
            if open { "OPEN" } else { "CLOSED" }
        );
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- SprinklerIndex -----------------------------------------------------

    #[test]
    fn index_bounds() {
        assert!(SprinklerIndex::new(0).is_some());
        assert!(SprinklerIndex::new(5).is_some());
        assert!(SprinklerIndex::new(6).is_none());
    }

    #[test]
    fn next_follows_ring_order() {
        let order: Vec<usize> = std::iter::successors(Some(SprinklerIndex::FIRST), |v| {
            Some(v.next())
        })
        .take(8)
        .map(SprinklerIndex::get)
        .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 0, 1]);
    }

    #[test]
    fn all_visits_six_valves() {
        assert_eq!(SprinklerIndex::all().count(), SprinklerIndex::COUNT);
    }

    // -- MockValves ---------------------------------------------------------

    #[test]
    fn mock_starts_closed() {
        let board = MockValves::new();
        assert_eq!(board.open_count(), 0);
        assert_eq!(board.open_valve(), None);
    }

    #[test]
    fn mock_set_open_and_close() {
        let mut board = MockValves::new();
        let v = SprinklerIndex::new(3).unwrap();
        board.set(v, true);
        assert_eq!(board.open_valve(), Some(v));
        board.set(v, false);
        assert_eq!(board.open_count(), 0);
        assert_eq!(board.writes, 2);
    }

    #[test]
    fn mock_open_valve_none_when_two_open() {
        let mut board = MockValves::new();
        board.set(SprinklerIndex::FIRST, true);
        board.set(SprinklerIndex::FIRST.next(), true);
        assert_eq!(board.open_count(), 2);
        assert_eq!(board.open_valve(), None);
    }
}
