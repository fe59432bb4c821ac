//! Prelude module for common re-exports.
//!
//! ```rust
//! use sorter_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::arm::config::{ArmConfig, AxisRoles, PoseConfig, SessionConfig};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Motion ─────────────────────────────────────────────────────────
pub use crate::arm::calibration::{CalibrationProfile, DependentCurve, Polynomial};
pub use crate::arm::error::{ArmError, CollaboratorError};
pub use crate::arm::profile::{InterpolationMode, SpeedProfile};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::config::{AxisConfig, HardwareConfig, MagnetConfig};
pub use crate::hal::driver::{DriverDiagnostics, DriverFactory, HalError, ServoDriver};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    DATASET_SPEED_PROFILE, DEFAULT_SPEED_PROFILE, MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US,
    SERVO_FRAME_HZ,
};
