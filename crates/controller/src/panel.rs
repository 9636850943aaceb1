//! Front panel wired to Raspberry Pi GPIO through rppal.

use std::time::Duration;

use anyhow::{Context, Result};
use rppal::gpio::{Gpio, InputPin};
use tracing::info;

#[cfg(feature = "adc")]
use crate::adc::RainAdc;
use crate::config::Config;
use crate::error::IoError;
use crate::inputs::{InputKind, InputLines};

pub struct GpioPanel {
    pins: Vec<InputPin>, // InputKind::index -> pin
    #[cfg(feature = "adc")]
    adc: Option<RainAdc>,
}

impl GpioPanel {
    /// Active-low lines get a pull-up so an open contact reads inactive;
    /// active-high lines get a pull-down.
    pub fn new(config: &Config) -> Result<Self> {
        let gpio = Gpio::new().context("failed to open GPIO")?;
        let mut pins = Vec::with_capacity(InputKind::COUNT);

        for kind in InputKind::ALL {
            let entry = config.inputs.get(kind);
            let pin = gpio
                .get(entry.gpio_pin as u8)
                .with_context(|| format!("failed to claim gpio {} for {kind}", entry.gpio_pin))?;
            let pin = if entry.active_low {
                pin.into_input_pullup()
            } else {
                pin.into_input_pulldown()
            };
            info!(input = %kind, gpio = entry.gpio_pin, active_low = entry.active_low, "input configured");
            pins.push(pin);
        }

        #[cfg(feature = "adc")]
        let adc = match &config.rain_intensity {
            Some(a) => Some(RainAdc::new(a.i2c_address as u16, a.channel as usize)?),
            None => None,
        };
        #[cfg(not(feature = "adc"))]
        if config.rain_intensity.is_some() {
            tracing::warn!("[rain_intensity] configured but built without the `adc` feature");
        }

        Ok(Self {
            pins,
            #[cfg(feature = "adc")]
            adc,
        })
    }
}

impl InputLines for GpioPanel {
    fn refresh(&mut self, _now: Duration) {
        #[cfg(feature = "adc")]
        if let Some(adc) = &mut self.adc {
            adc.poll(_now);
        }
    }

    fn read_level(&mut self, input: InputKind) -> Result<bool, IoError> {
        // Memory-mapped GPIO reads cannot fail once the pin is claimed.
        Ok(self.pins[input.index()].is_high())
    }

    fn read_rain_intensity(&mut self) -> Result<u16, IoError> {
        #[cfg(feature = "adc")]
        if let Some(adc) = &self.adc {
            return adc.reading();
        }
        Err(IoError::Unsupported)
    }
}
