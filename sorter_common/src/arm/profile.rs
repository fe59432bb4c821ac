//! Speed profiles.
//!
//! A profile fixes how fast a servo travels (pulse-width units per second),
//! how densely the move is sampled, how long to wait between samples, and
//! which interpolation shapes the move.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interpolation between start and end pulse width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    /// Constant velocity. Used for video recording, where equal spacing
    /// between frames matters more than smooth starts.
    Linear,
    /// Half-period sine S-curve: zero velocity at both ends.
    #[default]
    SineEased,
}

/// One named speed profile (`[speed_profiles.<name>]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// Travel rate [pulse-width µs per second].
    pub rate: f64,

    /// Steps per second used to size the trajectory.
    pub step_frequency_hz: f64,

    /// Interpolation shape.
    #[serde(default)]
    pub mode: InterpolationMode,

    /// Explicit delay between steps [ms]. Defaults to `1000 / step_frequency_hz`.
    #[serde(default)]
    pub step_interval_ms: Option<f64>,
}

impl SpeedProfile {
    /// Regular moves: 700 µs/s, one step per 50 Hz servo frame, sine-eased.
    pub const FAST: Self = Self {
        rate: 700.0,
        step_frequency_hz: 50.0,
        mode: InterpolationMode::SineEased,
        step_interval_ms: None,
    };

    /// Training-video sweep: 20 µs/s, linear, long settle time per step.
    pub const DATASET: Self = Self {
        rate: 20.0,
        step_frequency_hz: 2.0,
        mode: InterpolationMode::Linear,
        step_interval_ms: Some(1000.0 / 1.5),
    };

    /// Delay between two consecutive trajectory steps.
    pub fn step_interval(&self) -> Duration {
        let ms = match self.step_interval_ms {
            Some(ms) => ms,
            None if self.step_frequency_hz > 0.0 => 1000.0 / self.step_frequency_hz,
            None => 0.0,
        };
        Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }

    /// Validate a profile registered under `name`.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "speed profile '{name}': rate must be > 0 (got {})",
                self.rate
            )));
        }
        if !(self.step_frequency_hz.is_finite() && self.step_frequency_hz > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "speed profile '{name}': step_frequency_hz must be > 0 (got {})",
                self.step_frequency_hz
            )));
        }
        if let Some(ms) = self.step_interval_ms {
            if !(ms.is_finite() && ms >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "speed profile '{name}': step_interval_ms must be >= 0 (got {ms})"
                )));
            }
        }
        Ok(())
    }
}
