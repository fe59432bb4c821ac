//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `ServoDriver` trait without any
//! hardware. Each accepted write is appended to an ordered log, the latest
//! value per output is kept, and failures can be queued per output so tests
//! can exercise the retry and abort paths of the motion core.

use parking_lot::Mutex;
use sorter_common::hal::config::HardwareConfig;
use sorter_common::hal::driver::{
    DriverDiagnostics, HalError, ServoDriver, check_pulse_width,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// One accepted write, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverWrite {
    /// Servo pulse width [µs] (0 = released).
    Pulse {
        /// Servo channel.
        channel: u8,
        /// Pulse width written.
        pulse_width: f64,
    },
    /// Digital output level.
    Digital {
        /// Output pin.
        pin: u8,
        /// Level written.
        high: bool,
    },
}

#[derive(Debug, Default)]
struct SimState {
    hardware: Option<HardwareConfig>,
    pulse_widths: HashMap<u8, f64>,
    levels: HashMap<u8, bool>,
    log: Vec<DriverWrite>,
    pending_failures: HashMap<u8, u32>,
    diagnostics: DriverDiagnostics,
}

/// Simulation driver implementing the ServoDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Driver version
    version: &'static str,
    /// Artificial latency added to every write
    write_latency: Duration,
    /// Everything observable about the simulated outputs
    state: Mutex<SimState>,
}

impl SimulationDriver {
    /// Create a new, uninitialized simulation driver.
    pub fn new() -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            write_latency: Duration::ZERO,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Create a driver that is already initialized with `hardware`.
    pub fn with_hardware(hardware: &HardwareConfig) -> Self {
        let driver = Self::new();
        driver.state.lock().hardware = Some(hardware.clone());
        driver
    }

    /// Sleep this long inside every write, to model a slow bus.
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Make the next `count` writes to `output` fail with a communication error.
    pub fn fail_next_writes(&self, output: u8, count: u32) {
        self.state.lock().pending_failures.insert(output, count);
    }

    /// Last pulse width written to `channel`.
    pub fn pulse_width(&self, channel: u8) -> Option<f64> {
        self.state.lock().pulse_widths.get(&channel).copied()
    }

    /// Last level written to `pin`.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.state.lock().levels.get(&pin).copied()
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> Vec<DriverWrite> {
        self.state.lock().log.clone()
    }

    /// Every pulse width accepted on `channel`, in order.
    pub fn pulse_history(&self, channel: u8) -> Vec<f64> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|w| match *w {
                DriverWrite::Pulse {
                    channel: c,
                    pulse_width,
                } if c == channel => Some(pulse_width),
                _ => None,
            })
            .collect()
    }

    /// Every level accepted on `pin`, in order.
    pub fn level_history(&self, pin: u8) -> Vec<bool> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|w| match *w {
                DriverWrite::Digital { pin: p, high } if p == pin => Some(high),
                _ => None,
            })
            .collect()
    }

    /// Forget the write log (latest values are kept).
    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Shared write path: claim check, fault injection, bookkeeping.
    fn record(&self, output: u8, write: DriverWrite) -> Result<(), HalError> {
        let started = Instant::now();
        if !self.write_latency.is_zero() {
            std::thread::sleep(self.write_latency);
        }

        let mut state = self.state.lock();
        let hardware = state.hardware.as_ref().ok_or(HalError::NotInitialized)?;
        let claimed = match write {
            DriverWrite::Pulse { .. } => hardware.has_servo(output),
            DriverWrite::Digital { .. } => hardware.has_digital(output),
        };
        if !claimed {
            state.diagnostics.write_failures += 1;
            return Err(HalError::UnknownOutput(output));
        }

        if let Some(remaining) = state.pending_failures.get_mut(&output) {
            if *remaining > 0 {
                *remaining -= 1;
                state.diagnostics.write_failures += 1;
                debug!("Injected write failure on output {}", output);
                return Err(HalError::CommunicationError(format!(
                    "injected failure on output {output}"
                )));
            }
        }

        match write {
            DriverWrite::Pulse {
                channel,
                pulse_width,
            } => {
                state.pulse_widths.insert(channel, pulse_width);
                state.diagnostics.pulse_writes += 1;
            }
            DriverWrite::Digital { pin, high } => {
                state.levels.insert(pin, high);
                state.diagnostics.digital_writes += 1;
            }
        }
        state.log.push(write);

        let latency_us = started.elapsed().as_micros() as u64;
        if latency_us > state.diagnostics.max_write_latency_us {
            state.diagnostics.max_write_latency_us = latency_us;
        }
        Ok(())
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, config: &HardwareConfig) -> Result<(), HalError> {
        info!(
            "Initializing simulation driver with {} servo channels, {} digital outputs, frame {}us",
            config.servo_channels.len(),
            config.digital_outputs.len(),
            config.frame_period_us
        );
        self.state.get_mut().hardware = Some(config.clone());
        Ok(())
    }

    fn set_pulse_width(&self, channel: u8, pulse_width: f64) -> Result<(), HalError> {
        check_pulse_width(channel, pulse_width)?;
        trace!(channel, pulse_width, "sim pulse");
        self.record(
            channel,
            DriverWrite::Pulse {
                channel,
                pulse_width,
            },
        )
    }

    fn write_digital(&self, pin: u8, high: bool) -> Result<(), HalError> {
        trace!(pin, high, "sim digital");
        self.record(pin, DriverWrite::Digital { pin, high })
    }

    fn shutdown(&self) -> Result<(), HalError> {
        let state = self.state.lock();
        info!(
            "Shutting down simulation driver ({} pulse writes, {} digital writes, {} failures)",
            state.diagnostics.pulse_writes,
            state.diagnostics.digital_writes,
            state.diagnostics.write_failures
        );
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.state.lock().diagnostics.clone())
    }
}
