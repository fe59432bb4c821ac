//! Arm-level shared types.
//!
//! - [`profile`] - Named speed profiles and interpolation modes
//! - [`calibration`] - Fitted dependent-axis curves
//! - [`config`] - Top-level `arm.toml` layout
//! - [`error`] - Motion and session error taxonomy

pub mod calibration;
pub mod config;
pub mod error;
pub mod profile;
