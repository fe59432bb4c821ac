//! Trajectory planner.
//!
//! Turns a (start, end) pulse-width pair into the list of setpoints written
//! one per step. Step count is sized from the travel rate and the step
//! frequency:
//!
//! ```text
//! step_count = round(step_frequency_hz × |end − start| / rate)
//! ```
//!
//! Sine easing follows a half cosine period, so velocity is zero at both
//! ends and every point stays inside `[start, end]`.

use sorter_common::arm::error::ArmError;
use sorter_common::arm::profile::{InterpolationMode, SpeedProfile};
use std::f64::consts::PI;

/// Upper bound on generated points; anything larger is a unit mistake.
pub const MAX_TRAJECTORY_STEPS: usize = 1_000_000;

/// Ordered, non-empty list of pulse-width setpoints ending exactly at the
/// target.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    points: Vec<f64>,
}

impl Trajectory {
    /// Single-point trajectory that only asserts `end`.
    pub fn snap(end: f64) -> Self {
        Self { points: vec![end] }
    }

    #[inline]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when there are no setpoints.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Final setpoint.
    #[inline]
    pub fn end(&self) -> f64 {
        // Construction guarantees at least one point.
        self.points[self.points.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }
}

fn require_finite(name: &str, value: f64) -> Result<(), ArmError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ArmError::InvalidParameter(format!("{name} is not finite ({value})")))
    }
}

/// Plan a move from `start` to `end`.
///
/// # Arguments
/// - `rate`: Travel rate [µs of pulse width per second], must be > 0.
/// - `mode`: Interpolation shape.
/// - `step_frequency_hz`: Points per second of travel, must be > 0.
///
/// # Returns
/// `step_count + 1` points, or the single point `[end]` when the move is
/// shorter than one step.
///
/// # Errors
/// `ArmError::InvalidParameter` for non-positive rate/frequency, non-finite
/// inputs, or a step count above [`MAX_TRAJECTORY_STEPS`].
pub fn plan(
    start: f64,
    end: f64,
    rate: f64,
    mode: InterpolationMode,
    step_frequency_hz: f64,
) -> Result<Trajectory, ArmError> {
    require_finite("start", start)?;
    require_finite("end", end)?;
    require_finite("rate", rate)?;
    require_finite("step frequency", step_frequency_hz)?;
    if rate <= 0.0 {
        return Err(ArmError::InvalidParameter(format!(
            "rate must be > 0 (got {rate})"
        )));
    }
    if step_frequency_hz <= 0.0 {
        return Err(ArmError::InvalidParameter(format!(
            "step frequency must be > 0 (got {step_frequency_hz})"
        )));
    }

    let delta = end - start;
    let duration = delta.abs() / rate;
    let step_count = (step_frequency_hz * duration).round();
    if step_count > MAX_TRAJECTORY_STEPS as f64 {
        return Err(ArmError::InvalidParameter(format!(
            "{step_count} steps for {delta:.1}us at {rate}us/s"
        )));
    }
    let step_count = step_count as usize;
    if step_count == 0 {
        return Ok(Trajectory::snap(end));
    }

    let step_delta = delta / step_count as f64;
    let mut points: Vec<f64> = (0..=step_count)
        .map(|step| {
            let linear_delta = step as f64 * step_delta;
            match mode {
                InterpolationMode::Linear => start + linear_delta,
                InterpolationMode::SineEased => {
                    // sin(π·x − π/2)·d/2 + d/2 with x = linear_delta / delta
                    let phase = linear_delta / delta;
                    start + 0.5 * delta * (1.0 - (PI * phase).cos())
                }
            }
        })
        .collect();
    points[step_count] = end;

    Ok(Trajectory { points })
}

/// Plan with the rate, mode and step frequency of a speed profile.
#[inline]
pub fn plan_with_profile(
    start: f64,
    end: f64,
    profile: &SpeedProfile,
) -> Result<Trajectory, ArmError> {
    plan(start, end, profile.rate, profile.mode, profile.step_frequency_hz)
}

// ─── Tests ──────────────────────────────────────────────────────────
