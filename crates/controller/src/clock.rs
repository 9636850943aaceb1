//! Time sources: monotonic uptime for debounce and dwell timing, and local
//! civil time for the daily schedule.

use std::time::{Duration, Instant};

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{info, warn};

use crate::error::ClockError;

pub trait Clock {
    /// Monotonic time since start-up.
    fn uptime(&self) -> Duration;

    /// Local wall-clock time. May be unavailable.
    fn wall_time(&self) -> Result<PrimitiveDateTime, ClockError>;
}

/// Host clock with a UTC offset fixed once at start-up. No DST handling:
/// the offset sampled (or configured) at boot is used until restart.
pub struct SystemClock {
    boot: Instant,
    offset: Option<UtcOffset>,
}

impl SystemClock {
    /// `configured_minutes` overrides the host offset. Otherwise the host
    /// local offset is sampled now; this must run before any extra threads
    /// exist or the platform may refuse to report it.
    pub fn new(configured_minutes: Option<i32>) -> Self {
        let offset = match configured_minutes {
            Some(minutes) => match UtcOffset::from_whole_seconds(minutes * 60) {
                Ok(off) => Some(off),
                Err(e) => {
                    warn!(minutes, "configured UTC offset rejected: {e}");
                    None
                }
            },
            None => match UtcOffset::current_local_offset() {
                Ok(off) => Some(off),
                Err(e) => {
                    warn!("local UTC offset unknown ({e}); set [clock] utc_offset_minutes");
                    None
                }
            },
        };

        match offset {
            Some(off) => info!(offset = %off, "wall clock calibrated"),
            None => warn!("wall clock unavailable; automatic watering disabled"),
        }

        Self {
            boot: Instant::now(),
            offset,
        }
    }
}

impl Clock for SystemClock {
    fn uptime(&self) -> Duration {
        self.boot.elapsed()
    }

    fn wall_time(&self) -> Result<PrimitiveDateTime, ClockError> {
        let offset = self.offset.ok_or(ClockError::Unavailable)?;
        let now = OffsetDateTime::now_utc().to_offset(offset);
        Ok(PrimitiveDateTime::new(now.date(), now.time()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_offset_is_used() {
        let clock = SystemClock::new(Some(120));
        let local = clock.wall_time().unwrap();
        let utc = OffsetDateTime::now_utc();
        let utc = PrimitiveDateTime::new(utc.date(), utc.time());
        let diff = (local - utc).whole_minutes();
        assert!((119..=120).contains(&diff), "offset diff {diff}");
    }

    #[test]
    fn out_of_range_offset_means_unavailable() {
        let clock = SystemClock::new(Some(30 * 60));
        assert_eq!(clock.wall_time(), Err(ClockError::Unavailable));
    }

    #[test]
    fn uptime_is_monotonic() {
        let clock = SystemClock::new(Some(0));
        let a = clock.uptime();
        let b = clock.uptime();
        assert!(b >= a);
    }
}
