#[cfg(feature = "adc")]
mod adc;
mod clock;
mod config;
mod controller;
mod debounce;
mod error;
mod inputs;
#[cfg(feature = "gpio")]
mod panel;
mod schedule;
mod sequencer;
#[cfg(all(feature = "sim", not(feature = "gpio")))]
mod sim;
mod status;
mod valve;

#[cfg(not(any(feature = "gpio", feature = "sim")))]
compile_error!("enable either the `gpio` or the `sim` feature");

use std::env;

use anyhow::Result;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clock::{Clock, SystemClock};
use controller::Controller;
use inputs::{InputBank, InputLines};
use valve::ValveLines;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config file ─────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "sprinkler.toml".to_string());
    let cfg = config::load(&config_path)?;

    // The host offset must be sampled before any helper thread exists.
    let clock = SystemClock::new(cfg.utc_offset_minutes());

    // ── Hardware ────────────────────────────────────────────────────
    #[cfg(feature = "gpio")]
    let (panel, valves) = (
        panel::GpioPanel::new(&cfg)?,
        valve::GpioValves::new(&cfg.valve_pins()?, cfg.valves.active_low)?,
    );

    #[cfg(not(feature = "gpio"))]
    let (panel, valves) = {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        sim::spawn_stdin_reader(tx);
        info!("running with simulated panel and valves");
        (sim::SimPanel::new(rx, cfg.active_low()), valve::MockValves::new())
    };

    run(&cfg, &clock, panel, valves).await
}

async fn run<L, V>(cfg: &config::Config, clock: &SystemClock, panel: L, valves: V) -> Result<()>
where
    L: InputLines,
    V: ValveLines,
{
    let mut bank = InputBank::new(panel, cfg.debounce(), cfg.active_low());
    let mut controller = Controller::new(valves, cfg.dwell(), cfg.schedule_target()?);
    controller.seed_schedule(clock.uptime(), clock.wall_time());
    match controller.next_watering() {
        Some(next) => info!(%next, "next automatic watering"),
        None => warn!("no wall clock yet; automatic watering waits for one"),
    }

    let mut ticker = interval(cfg.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_status = Instant::now();
    let mut last_mode = controller.mode().name();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(tick_ms = cfg.tick_ms, "control loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.uptime();
                let snapshot = bank.sample_all(now);
                controller.tick(&snapshot, now, clock.wall_time());

                let mode = controller.mode().name();
                if mode != last_mode || last_status.elapsed() >= cfg.status_interval() {
                    last_mode = mode;
                    last_status = Instant::now();
                    log_status(&controller.status(now));
                }
            }
            _ = &mut shutdown => {
                let now = clock.uptime();
                controller.shutdown(now);
                info!(open_valve = ?controller.open_valve(), "shutdown: all valves closed");
                log_status(&controller.status(now));
                return Ok(());
            }
        }
    }
}

fn log_status(snapshot: &status::StatusSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => info!(target: "status", "{json}"),
        Err(e) => warn!("status snapshot not serialisable: {e}"),
    }
}
