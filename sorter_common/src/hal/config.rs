//! Hardware configuration types.
//!
//! - `AxisConfig` - One servo: output channel, home and safe pulse-width range
//! - `MagnetConfig` - Digital output driving the electromagnet
//! - `HardwareConfig` - Everything a driver has to claim at `init()`

use crate::config::ConfigError;
use crate::consts::{MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US, SERVO_FRAME_PERIOD_US};
use serde::{Deserialize, Serialize};

fn default_min_pulse_width() -> f64 {
    MIN_PULSE_WIDTH_US
}

fn default_max_pulse_width() -> f64 {
    MAX_PULSE_WIDTH_US
}

/// Per-servo configuration (`[[axes]]` in `arm.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Human-readable axis name, used in logs.
    pub name: String,

    /// Output channel (BCM GPIO number on the Raspberry Pi driver).
    pub channel: u8,

    /// Home pulse width [µs]. Initial position and reset target.
    pub home: f64,

    /// Lower bound of the mechanically safe range [µs].
    #[serde(default = "default_min_pulse_width")]
    pub min_pulse_width: f64,

    /// Upper bound of the mechanically safe range [µs].
    #[serde(default = "default_max_pulse_width")]
    pub max_pulse_width: f64,
}

impl AxisConfig {
    /// Convenience constructor with the full servo range.
    pub fn new(name: &str, channel: u8, home: f64) -> Self {
        Self {
            name: name.to_string(),
            channel,
            home,
            min_pulse_width: MIN_PULSE_WIDTH_US,
            max_pulse_width: MAX_PULSE_WIDTH_US,
        }
    }

    /// Clamp a pulse width into this axis' safe range.
    #[inline]
    pub fn clamp(&self, pulse_width: f64) -> f64 {
        pulse_width.clamp(self.min_pulse_width, self.max_pulse_width)
    }

    /// Validate bounds and home position.
    ///
    /// # Validation Rules
    /// 1. `name` not empty
    /// 2. `MIN_PULSE_WIDTH_US <= min_pulse_width < max_pulse_width <= MAX_PULSE_WIDTH_US`
    /// 3. `home` inside `[min_pulse_width, max_pulse_width]`
    pub fn validate(&self, idx: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "axis {idx}: name cannot be empty"
            )));
        }
        if !(self.min_pulse_width >= MIN_PULSE_WIDTH_US
            && self.max_pulse_width <= MAX_PULSE_WIDTH_US
            && self.min_pulse_width < self.max_pulse_width)
        {
            return Err(ConfigError::ValidationError(format!(
                "axis {idx} ({}): range [{}, {}] must lie inside [{MIN_PULSE_WIDTH_US}, {MAX_PULSE_WIDTH_US}]",
                self.name, self.min_pulse_width, self.max_pulse_width
            )));
        }
        if !(self.min_pulse_width..=self.max_pulse_width).contains(&self.home) {
            return Err(ConfigError::ValidationError(format!(
                "axis {idx} ({}): home {} outside [{}, {}]",
                self.name, self.home, self.min_pulse_width, self.max_pulse_width
            )));
        }
        Ok(())
    }
}

/// Electromagnet output (`[magnet]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetConfig {
    /// Digital output pin (BCM numbering).
    pub pin: u8,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self { pin: 23 }
    }
}

/// Outputs a driver must claim at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareConfig {
    /// Servo PWM channels, in axis order.
    pub servo_channels: Vec<u8>,
    /// Digital outputs.
    pub digital_outputs: Vec<u8>,
    /// PWM frame period [µs].
    pub frame_period_us: u64,
}

impl HardwareConfig {
    /// Build the mapping for a set of axes plus digital outputs.
    pub fn new(axes: &[AxisConfig], digital_outputs: &[u8]) -> Self {
        Self {
            servo_channels: axes.iter().map(|a| a.channel).collect(),
            digital_outputs: digital_outputs.to_vec(),
            frame_period_us: SERVO_FRAME_PERIOD_US,
        }
    }

    /// True if `channel` is a configured servo output.
    pub fn has_servo(&self, channel: u8) -> bool {
        self.servo_channels.contains(&channel)
    }

    /// True if `pin` is a configured digital output.
    pub fn has_digital(&self, pin: u8) -> bool {
        self.digital_outputs.contains(&pin)
    }
}
