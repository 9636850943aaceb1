use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 64;

/// Events included in a status snapshot, newest first.
const SNAPSHOT_EVENTS: usize = 10;

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub uptime_ms: u64,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Valve,
    Mode,
    Schedule,
    Fault,
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<SystemEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn push(&mut self, now: Duration, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            uptime_ms: now.as_millis() as u64,
            kind,
            detail,
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &SystemEvent> {
        self.events.iter()
    }

    /// Most recent events, newest first.
    pub fn recent(&self, n: usize) -> Vec<SystemEvent> {
        self.events.iter().rev().take(n).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// JSON snapshot (what the heartbeat logs)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub mode: &'static str,
    pub cycle_secs: Option<u64>,
    pub open_valve: Option<usize>,
    pub valve_open_secs: Option<u64>,
    pub last_valve: Option<usize>,
    pub schedule_target: String,
    pub next_watering: Option<String>,
    pub rain_intensity: Option<u16>,
    pub events: Vec<SystemEvent>,
}

impl StatusSnapshot {
    pub fn recent_events(log: &EventLog) -> Vec<SystemEvent> {
        log.recent(SNAPSHOT_EVENTS)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut log = EventLog::new();
        for i in 0..(MAX_EVENTS + 10) {
            log.push(Duration::from_millis(i as u64), EventKind::Valve, format!("e{i}"));
        }
        assert_eq!(log.len(), MAX_EVENTS);
        // Oldest entries were dropped.
        assert_eq!(log.iter().next().map(|e| e.detail.as_str()), Some("e10"));
    }

    #[test]
    fn recent_is_newest_first() {
        let mut log = EventLog::new();
        log.push(Duration::from_millis(1), EventKind::Mode, "a".into());
        log.push(Duration::from_millis(2), EventKind::Mode, "b".into());
        let recent = log.recent(5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].detail, "b");
    }

    #[test]
    fn event_kind_serializes_lowercase() {
        let json = serde_json::to_string(&EventKind::Fault).unwrap();
        assert_eq!(json, "\"fault\"");
    }

    #[test]
    fn snapshot_serializes() {
        let snap = StatusSnapshot {
            uptime_secs: 5,
            mode: "idle",
            cycle_secs: None,
            open_valve: None,
            valve_open_secs: None,
            last_valve: Some(5),
            schedule_target: "19:00".into(),
            next_watering: Some("2024-06-02 19:00".into()),
            rain_intensity: Some(812),
            events: vec![],
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["mode"], "idle");
        assert_eq!(json["last_valve"], 5);
        assert!(json["open_valve"].is_null());
        assert_eq!(json["rain_intensity"], 812);
    }
}
