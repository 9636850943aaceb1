//! ADS1115 16-bit ADC over I2C for the analog rain-intensity sensor.
//!
//! One single-ended channel at PGA ±4.096 V, 128 SPS, single-shot mode.
//! The control loop must never sleep, so a conversion is started on one
//! poll and collected on a later one.

use std::time::Duration;

use anyhow::{ensure, Result};
use rppal::i2c::I2c;
use tracing::{info, warn};

use crate::error::IoError;

// ── ADS1115 register addresses ──────────────────────────────────────────────

/// Conversion result register (read-only, 16-bit signed).
const REG_CONVERSION: u8 = 0x00;
/// Configuration register (read/write).
const REG_CONFIG: u8 = 0x01;

// ── Config register bit fields ──────────────────────────────────────────────
//
// Layout (MSB first):
//   [15]    OS       write 1 to start single-shot conversion
//   [14:12] MUX      input multiplexer (channel selection)
//   [11:9]  PGA      programmable gain amplifier
//   [8]     MODE     0 = continuous, 1 = single-shot
//   [7:5]   DR       data rate
//   [1:0]   COMP_QUE 11 = comparator off

/// OS=1, PGA=001 (±4.096 V), MODE=1, DR=100 (128 SPS), COMP_QUE=11.
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;

const MUX_SHIFT: u8 = 12;
const MUX_SINGLE_ENDED: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

/// Conversion time at 128 SPS is ~7.8 ms.
const CONVERSION_WAIT: Duration = Duration::from_millis(9);

/// Rain intensity changes slowly; one reading a second is plenty.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Bit 15 of the config register reads 1 once the conversion is done.
const OS_READY_BIT: u16 = 1 << 15;

fn config_for_channel(channel: usize) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[channel] << MUX_SHIFT)
}

/// Single-ended reads are non-negative; clamp against bus corruption.
fn to_intensity(raw: i16) -> u16 {
    raw.max(0) as u16
}

// ── Driver ──────────────────────────────────────────────────────────────────

pub struct RainAdc {
    i2c: I2c,
    channel: usize,
    started: Option<Duration>,
    last_start: Option<Duration>,
    reading: Result<u16, IoError>,
}

impl RainAdc {
    /// Open I2C bus 1 for an ADS1115 at `addr`.
    pub fn new(addr: u16, channel: usize) -> Result<Self> {
        ensure!(
            channel < MUX_SINGLE_ENDED.len(),
            "ADS1115 channel {channel} out of range (0-3)"
        );

        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;

        info!(
            addr = format_args!("0x{addr:02x}"),
            channel, "ads1115 initialised"
        );

        Ok(Self {
            i2c,
            channel,
            started: None,
            last_start: None,
            reading: Err(IoError::AnalogReadFailed),
        })
    }

    /// Advance the start/collect cycle. Called once per control cycle.
    pub fn poll(&mut self, now: Duration) {
        match self.started {
            Some(at) if now.saturating_sub(at) >= CONVERSION_WAIT => {
                self.started = None;
                let result = self.collect();
                if let (Err(e), Ok(_)) = (&result, &self.reading) {
                    warn!(channel = self.channel, "adc read failed: {e}");
                }
                self.reading = result.map_err(|_| IoError::AnalogReadFailed);
            }
            Some(_) => {}
            None => {
                let due = self
                    .last_start
                    .map_or(true, |t| now.saturating_sub(t) >= SAMPLE_INTERVAL);
                if due {
                    self.last_start = Some(now);
                    match self.start() {
                        Ok(()) => self.started = Some(now),
                        Err(e) => {
                            if self.reading.is_ok() {
                                warn!(channel = self.channel, "adc start failed: {e}");
                            }
                            self.reading = Err(IoError::AnalogReadFailed);
                        }
                    }
                }
            }
        }
    }

    /// Latest completed reading.
    pub fn reading(&self) -> Result<u16, IoError> {
        self.reading
    }

    fn start(&mut self) -> Result<()> {
        let config = config_for_channel(self.channel);
        self.i2c.block_write(REG_CONFIG, &config.to_be_bytes())?;
        Ok(())
    }

    fn collect(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c.block_read(REG_CONFIG, &mut buf)?;
        ensure!(
            u16::from_be_bytes(buf) & OS_READY_BIT != 0,
            "conversion not ready"
        );

        self.i2c.block_read(REG_CONVERSION, &mut buf)?;
        Ok(to_intensity(i16::from_be_bytes(buf)))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
