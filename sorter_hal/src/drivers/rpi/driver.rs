//! `RpiDriver` - rppal-backed implementation of `ServoDriver`.

use parking_lot::Mutex;
use rppal::gpio::{Gpio, OutputPin};
use sorter_common::hal::config::HardwareConfig;
use sorter_common::hal::driver::{
    DriverDiagnostics, HalError, ServoDriver, check_pulse_width,
};
use sorter_common::consts::RELEASE_PULSE_WIDTH_US;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Counters {
    pulse_writes: u64,
    digital_writes: u64,
    write_failures: u64,
    max_write_latency_us: u64,
}

/// Raspberry Pi GPIO driver.
///
/// Each claimed pin sits behind its own mutex so writes to different axes
/// never contend.
pub struct RpiDriver {
    frame_period: Duration,
    servos: HashMap<u8, Mutex<OutputPin>>,
    outputs: HashMap<u8, Mutex<OutputPin>>,
    counters: Mutex<Counters>,
}

impl RpiDriver {
    /// Create an unclaimed driver. Pins are opened in `init()`.
    pub fn new() -> Self {
        Self {
            frame_period: Duration::from_micros(20_000),
            servos: HashMap::new(),
            outputs: HashMap::new(),
            counters: Mutex::new(Counters::default()),
        }
    }

    fn track(&self, started: Instant, result: &Result<(), HalError>, digital: bool) {
        let mut counters = self.counters.lock();
        match result {
            Ok(()) if digital => counters.digital_writes += 1,
            Ok(()) => counters.pulse_writes += 1,
            Err(_) => counters.write_failures += 1,
        }
        let latency_us = started.elapsed().as_micros() as u64;
        counters.max_write_latency_us = counters.max_write_latency_us.max(latency_us);
    }
}

impl Default for RpiDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn claim(gpio: &Gpio, pin: u8) -> Result<OutputPin, HalError> {
    gpio.get(pin)
        .map(|p| p.into_output_low())
        .map_err(|e| HalError::InitFailed(format!("GPIO {pin}: {e}")))
}

impl ServoDriver for RpiDriver {
    fn name(&self) -> &'static str {
        "rpi"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &HardwareConfig) -> Result<(), HalError> {
        let gpio = Gpio::new().map_err(|e| HalError::InitFailed(e.to_string()))?;
        self.frame_period = Duration::from_micros(config.frame_period_us);

        for &channel in &config.servo_channels {
            self.servos.insert(channel, Mutex::new(claim(&gpio, channel)?));
        }
        for &pin in &config.digital_outputs {
            self.outputs.insert(pin, Mutex::new(claim(&gpio, pin)?));
        }

        info!(
            "Raspberry Pi driver claimed servo pins {:?} and outputs {:?}",
            config.servo_channels, config.digital_outputs
        );
        Ok(())
    }

    fn set_pulse_width(&self, channel: u8, pulse_width: f64) -> Result<(), HalError> {
        check_pulse_width(channel, pulse_width)?;
        let pin = self
            .servos
            .get(&channel)
            .ok_or(HalError::UnknownOutput(channel))?;

        let started = Instant::now();
        let result = {
            let mut pin = pin.lock();
            if pulse_width == RELEASE_PULSE_WIDTH_US {
                pin.clear_pwm()
            } else {
                pin.set_pwm(
                    self.frame_period,
                    Duration::from_secs_f64(pulse_width / 1_000_000.0),
                )
            }
        }
        .map_err(|e| HalError::CommunicationError(format!("GPIO {channel}: {e}")));
        self.track(started, &result, false);
        result
    }

    fn write_digital(&self, pin: u8, high: bool) -> Result<(), HalError> {
        let output = self.outputs.get(&pin).ok_or(HalError::UnknownOutput(pin))?;
        let started = Instant::now();
        {
            let mut output = output.lock();
            if high {
                output.set_high();
            } else {
                output.set_low();
            }
        }
        debug!(pin, high, "digital output");
        let result = Ok(());
        self.track(started, &result, true);
        result
    }

    fn shutdown(&self) -> Result<(), HalError> {
        for (channel, pin) in &self.servos {
            if let Err(e) = pin.lock().clear_pwm() {
                warn!("Failed to stop PWM on GPIO {}: {}", channel, e);
            }
        }
        for pin in self.outputs.values() {
            pin.lock().set_low();
        }
        info!("Raspberry Pi driver released all pins");
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        let counters = self.counters.lock();
        Some(DriverDiagnostics {
            pulse_writes: counters.pulse_writes,
            digital_writes: counters.digital_writes,
            write_failures: counters.write_failures,
            max_write_latency_us: counters.max_write_latency_us,
        })
    }
}
