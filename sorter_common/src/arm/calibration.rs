//! Dependent-axis calibration.
//!
//! The elevation and wrist joints sit on a multi-bar linkage driven by the
//! reach joint. Their setpoints for a level gripper were recorded at seven
//! reach positions on the physical rig and fitted with cubic polynomials.
//! The coefficients are data: swap the profile, not the algorithm.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Polynomial with coefficients in ascending powers: `c0 + c1·x + c2·x² + …`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Evaluate with Horner's scheme.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

/// One dependent axis: fitted curve plus the extra lift applied at drop-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentCurve {
    /// Setpoint as a function of the reach pulse width.
    pub polynomial: Polynomial,

    /// Added to the curve output when moving to a drop-off.
    #[serde(default)]
    pub dropoff_offset: f64,
}

impl DependentCurve {
    /// Setpoint for a resolved reach pulse width.
    #[inline]
    pub fn setpoint(&self, reach: f64, as_dropoff: bool) -> f64 {
        let lift = if as_dropoff { self.dropoff_offset } else { 0.0 };
        self.polynomial.eval(reach) + lift
    }
}

fn default_reach_scale() -> f64 {
    1.0
}

/// Calibration profile (`[calibration]`).
///
/// Reach pulse width is derived from the target distance:
/// `reach = distance · reach_scale + reach_bias − dropoff_reach_offset`
/// (the last term only at drop-off). Both dependent setpoints are then
/// evaluated at that reach value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    #[serde(default = "default_reach_scale")]
    pub reach_scale: f64,

    #[serde(default)]
    pub reach_bias: f64,

    /// Subtracted from the reach at drop-off so the gripper stays above
    /// the container walls.
    #[serde(default)]
    pub dropoff_reach_offset: f64,

    /// First dependent axis; also the clearance joint.
    pub elevation: DependentCurve,

    /// Second dependent axis.
    pub wrist: DependentCurve,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            reach_scale: 1.0,
            reach_bias: 0.0,
            dropoff_reach_offset: 300.0,
            elevation: DependentCurve {
                polynomial: Polynomial::new(vec![7341.0, -10.3, 5.26e-3, -7.83e-7]),
                dropoff_offset: 300.0,
            },
            wrist: DependentCurve {
                polynomial: Polynomial::new(vec![-6634.0, 14.2, -8.11e-3, 1.48e-6]),
                dropoff_offset: 0.0,
            },
        }
    }
}

impl CalibrationProfile {
    /// Reach pulse width for a target distance.
    #[inline]
    pub fn reach_for(&self, distance: f64, as_dropoff: bool) -> f64 {
        let offset = if as_dropoff {
            self.dropoff_reach_offset
        } else {
            0.0
        };
        distance * self.reach_scale + self.reach_bias - offset
    }

    /// `(elevation, wrist)` setpoints for a resolved reach pulse width.
    #[inline]
    pub fn dependents(&self, reach: f64, as_dropoff: bool) -> (f64, f64) {
        (
            self.elevation.setpoint(reach, as_dropoff),
            self.wrist.setpoint(reach, as_dropoff),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            self.reach_scale,
            self.reach_bias,
            self.dropoff_reach_offset,
            self.elevation.dropoff_offset,
            self.wrist.dropoff_offset,
        ];
        let coefficients = self
            .elevation
            .polynomial
            .coefficients
            .iter()
            .chain(self.wrist.polynomial.coefficients.iter());
        if scalars.iter().chain(coefficients).any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationError(
                "calibration values must be finite".to_string(),
            ));
        }
        if self.elevation.polynomial.coefficients.is_empty()
            || self.wrist.polynomial.coefficients.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "calibration polynomials need at least one coefficient".to_string(),
            ));
        }
        if self.reach_scale == 0.0 {
            return Err(ConfigError::ValidationError(
                "calibration reach_scale cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
