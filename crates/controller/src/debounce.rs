//! Time-window debouncing for a single digital line.
//!
//! The stable level only follows the raw level once the raw level has held
//! still for longer than the window. Must be polled at a cadence well below
//! the window; there is no interrupt path.

use std::time::Duration;

/// Default debounce window for mechanical buttons and switches.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(50);

/// Result of one [`DebouncedSignal::sample`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Stable level after this sample.
    pub level: bool,
    /// True only on the sample where the stable level changed.
    pub transitioned: bool,
}

#[derive(Debug, Clone)]
pub struct DebouncedSignal {
    stable: bool,
    last_raw: bool,
    last_change: Duration,
    window: Duration,
}

impl DebouncedSignal {
    /// Start out settled at `idle_level`.
    pub fn new(idle_level: bool, window: Duration) -> Self {
        Self {
            stable: idle_level,
            last_raw: idle_level,
            last_change: Duration::ZERO,
            window,
        }
    }

    /// Feed one raw reading taken at uptime `now`.
    pub fn sample(&mut self, raw: bool, now: Duration) -> Sample {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change = now;
        }

        let settled = now.saturating_sub(self.last_change) > self.window;
        let transitioned = settled && raw != self.stable;
        if transitioned {
            self.stable = raw;
        }

        Sample {
            level: self.stable,
            transitioned,
        }
    }

    pub fn level(&self) -> bool {
        self.stable
    }
}

// ===========================================================================
// Tests
// ===========================================================================
