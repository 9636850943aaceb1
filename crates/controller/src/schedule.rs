//! Daily watering schedule: one fixed time of day, rolled to tomorrow once
//! it has passed.
//!
//! Times are local civil time as kept by the clock; there is no DST
//! correction.

use std::fmt;

use time::{PrimitiveDateTime, Time};
use tracing::{info, warn};

use crate::error::ClockError;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Daily time-of-day at which automatic watering may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTarget {
    at: Time,
}

impl ScheduleTarget {
    pub fn new(hour: u8, minute: u8) -> Result<Self, time::error::ComponentRange> {
        Ok(Self {
            at: Time::from_hms(hour, minute, 0)?,
        })
    }

    pub fn hour(&self) -> u8 {
        self.at.hour()
    }

    pub fn minute(&self) -> u8 {
        self.at.minute()
    }
}

impl fmt::Display for ScheduleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Today's occurrence of `target`, or tomorrow's if today's is strictly in
/// the past.
pub fn compute_next(now: PrimitiveDateTime, target: ScheduleTarget) -> PrimitiveDateTime {
    let today = PrimitiveDateTime::new(now.date(), target.at);
    if today < now {
        today + time::Duration::DAY
    } else {
        today
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScheduleTracker {
    target: ScheduleTarget,
    next: Option<PrimitiveDateTime>,
}

impl ScheduleTracker {
    /// The next instant is unknown until [`seed`](Self::seed) succeeds.
    pub fn new(target: ScheduleTarget) -> Self {
        Self { target, next: None }
    }

    pub fn target(&self) -> ScheduleTarget {
        self.target
    }

    pub fn next(&self) -> Option<PrimitiveDateTime> {
        self.next
    }

    /// Initial computation; a target equal to `now` counts as due.
    pub fn seed(&mut self, now: Result<PrimitiveDateTime, ClockError>) -> Result<(), ClockError> {
        let now = self.clock_or_keep(now)?;
        let next = compute_next(now, self.target);
        info!(next = %next, target = %self.target, "schedule seeded");
        self.next = Some(next);
        Ok(())
    }

    /// Recompute after a cycle ends. The result is strictly after `now`,
    /// so a stop at the exact target instant cannot retrigger.
    pub fn reschedule(
        &mut self,
        now: Result<PrimitiveDateTime, ClockError>,
    ) -> Result<(), ClockError> {
        let now = self.clock_or_keep(now)?;
        let mut next = compute_next(now, self.target);
        if next <= now {
            next += time::Duration::DAY;
        }
        info!(next = %next, "next watering rescheduled");
        self.next = Some(next);
        Ok(())
    }

    /// Whether `now` is at or after the next watering instant.
    pub fn is_due(&self, now: PrimitiveDateTime) -> bool {
        self.next.is_some_and(|next| now >= next)
    }

    fn clock_or_keep(
        &self,
        now: Result<PrimitiveDateTime, ClockError>,
    ) -> Result<PrimitiveDateTime, ClockError> {
        now.map_err(|e| {
            warn!(previous = ?self.next, "schedule not recomputed: {e}");
            e
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
