//! Fault types for the control loop.
//!
//! Nothing here is fatal. Components that detect a fault absorb it locally
//! (freeze an input, keep the previous schedule) and surface it through
//! logging and the status event log; the per-cycle evaluation never aborts.

use std::fmt;

use crate::inputs::InputKind;

// ---------------------------------------------------------------------------
// I/O errors (input lines, ADC)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// A digital line could not be read this cycle.
    ReadFailed(InputKind),
    /// The analog rain-intensity reading failed or returned garbage.
    #[cfg(feature = "adc")]
    AnalogReadFailed,
    /// The backend has no such line (e.g. no ADC fitted).
    Unsupported,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed(input) => write!(f, "read failed on {input} line"),
            #[cfg(feature = "adc")]
            Self::AnalogReadFailed => write!(f, "rain intensity read failed"),
            Self::Unsupported => write!(f, "line not available on this backend"),
        }
    }
}

impl std::error::Error for IoError {}

// ---------------------------------------------------------------------------
// Clock errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// Wall-clock time cannot be determined (no offset, RTC not answering).
    Unavailable,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "wall clock unavailable"),
        }
    }
}

impl std::error::Error for ClockError {}

// ---------------------------------------------------------------------------
// Faults (what the controller records)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Schedule recompute skipped; previous next-watering instant retained.
    ClockUnavailable,
    /// Input stable level frozen at its last known value.
    InputReadFailure(InputKind),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockUnavailable => write!(f, "clock unavailable, schedule unchanged"),
            Self::InputReadFailure(input) => write!(f, "{input} input frozen after read failure"),
        }
    }
}

impl From<ClockError> for Fault {
    fn from(_: ClockError) -> Self {
        Self::ClockUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_line() {
        let msg = IoError::ReadFailed(InputKind::Rain).to_string();
        assert_eq!(msg, "read failed on rain line");
    }

    #[test]
    fn clock_error_maps_to_clock_fault() {
        assert_eq!(Fault::from(ClockError::Unavailable), Fault::ClockUnavailable);
    }

    #[test]
    fn input_fault_display() {
        let msg = Fault::InputReadFailure(InputKind::Stop).to_string();
        assert!(msg.contains("stop"), "got: {msg}");
    }
}
