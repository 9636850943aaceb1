//! Simulated front panel for running the controller without GPIO hardware.
//!
//! Commands arrive on stdin, one per line:
//!
//! ```text
//! start | stop | manual          press and release a button
//! auto on|off                    flip the automatic-enable switch
//! rain on|off                    wet or dry the rain sensor
//! intensity <n>                  set the analog rain reading
//! fault <input> on|off           make an input line fail to read
//! ```
//!
//! Every level change bounces for a short while before settling, so the
//! debouncer sees something like real contacts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::error::IoError;
use crate::inputs::{InputKind, InputLines};

/// How long a simulated button press is held down.
const PRESS_HOLD: Duration = Duration::from_millis(150);

/// Contact bounce after each level change.
const BOUNCE: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    Press(InputKind),
    Switch(InputKind, bool),
    Intensity(u16),
    Fault(InputKind, bool),
}

fn parse_on_off(word: Option<&str>) -> Result<bool, String> {
    match word.map(str::to_ascii_lowercase).as_deref() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        other => Err(format!("expected on|off, got {other:?}")),
    }
}

impl FromStr for PanelCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".into());
        };

        let cmd = match head.to_ascii_lowercase().as_str() {
            "start" => Self::Press(InputKind::Start),
            "stop" => Self::Press(InputKind::Stop),
            "manual" => Self::Press(InputKind::Manual),
            "auto" => Self::Switch(InputKind::AutoEnable, parse_on_off(words.next())?),
            "rain" => Self::Switch(InputKind::Rain, parse_on_off(words.next())?),
            "intensity" => {
                let value = words.next().ok_or("intensity needs a value")?;
                let value = value
                    .parse()
                    .map_err(|_| format!("invalid intensity {value:?}"))?;
                Self::Intensity(value)
            }
            "fault" => {
                let name = words.next().ok_or("fault needs an input name")?;
                let kind =
                    InputKind::from_name(name).ok_or_else(|| format!("unknown input {name:?}"))?;
                Self::Fault(kind, parse_on_off(words.next())?)
            }
            other => return Err(format!("unknown command {other:?}")),
        };

        match words.next() {
            Some(extra) => Err(format!("unexpected argument {extra:?}")),
            None => Ok(cmd),
        }
    }
}

impl fmt::Display for PanelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |on: bool| if on { "on" } else { "off" };
        match self {
            Self::Press(kind) => write!(f, "{kind}"),
            Self::Switch(kind, on) => write!(f, "{kind} {}", on_off(*on)),
            Self::Intensity(v) => write!(f, "intensity {v}"),
            Self::Fault(kind, on) => write!(f, "fault {kind} {}", on_off(*on)),
        }
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct SimLine {
    active: bool,
    failing: bool,
    bounce_until: Duration,
    release_at: Option<Duration>,
}

pub struct SimPanel {
    commands: UnboundedReceiver<PanelCommand>,
    lines: [SimLine; InputKind::COUNT],
    active_low: [bool; InputKind::COUNT],
    intensity: Option<u16>,
    now: Duration,
}

impl SimPanel {
    /// Everything starts released: buttons up, automatic disabled, dry.
    pub fn new(
        commands: UnboundedReceiver<PanelCommand>,
        active_low: [bool; InputKind::COUNT],
    ) -> Self {
        Self {
            commands,
            lines: [SimLine::default(); InputKind::COUNT],
            active_low,
            intensity: None,
            now: Duration::ZERO,
        }
    }

    fn set_active(&mut self, kind: InputKind, active: bool) {
        let line = &mut self.lines[kind.index()];
        if line.active != active {
            line.active = active;
            line.bounce_until = self.now + BOUNCE;
        }
    }

    fn apply(&mut self, cmd: PanelCommand) {
        info!(command = %cmd, "panel command");
        match cmd {
            PanelCommand::Press(kind) => {
                self.set_active(kind, true);
                self.lines[kind.index()].release_at = Some(self.now + PRESS_HOLD);
            }
            PanelCommand::Switch(kind, on) => self.set_active(kind, on),
            PanelCommand::Intensity(v) => self.intensity = Some(v),
            PanelCommand::Fault(kind, on) => self.lines[kind.index()].failing = on,
        }
    }
}

impl InputLines for SimPanel {
    fn refresh(&mut self, now: Duration) {
        self.now = now;

        for kind in InputKind::ALL {
            if let Some(at) = self.lines[kind.index()].release_at {
                if now >= at {
                    self.lines[kind.index()].release_at = None;
                    self.set_active(kind, false);
                }
            }
        }

        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd);
        }
    }

    fn read_level(&mut self, input: InputKind) -> Result<bool, IoError> {
        let line = self.lines[input.index()];
        if line.failing {
            return Err(IoError::ReadFailed(input));
        }
        if self.now < line.bounce_until {
            return Ok(fastrand::bool());
        }
        // Electrical level: active-low lines read LOW when active.
        Ok(line.active != self.active_low[input.index()])
    }

    fn read_rain_intensity(&mut self) -> Result<u16, IoError> {
        self.intensity.ok_or(IoError::Unsupported)
    }
}

// ---------------------------------------------------------------------------
// Stdin reader
// ---------------------------------------------------------------------------

/// Forward parsed stdin lines to the panel until stdin closes.
pub fn spawn_stdin_reader(tx: UnboundedSender<PanelCommand>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("sim panel ready: start | stop | manual | auto on|off | rain on|off | intensity <n> | fault <input> on|off");
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<PanelCommand>() {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("ignored panel command: {e}"),
                },
                Ok(None) => {
                    info!("stdin closed, sim panel commands stopped");
                    break;
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
}

// ===========================================================================
// Tests
// ===========================================================================
