//! Sorter Common Library
//!
//! Shared constants, configuration loading and the error taxonomy for all
//! sorter workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - TOML configuration loading traits and shared fields
//! - [`hal`] - Servo/GPIO driver contract and hardware configuration
//! - [`arm`] - Speed profiles, calibration curves, poses and arm errors
//! - [`consts`] - Pulse-width limits and default paths
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust,no_run
//! use sorter_common::arm::config::ArmConfig;
//! use sorter_common::config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ArmConfig::load_validated(Path::new("/etc/sorter/arm.toml")).unwrap();
//! println!("arm {} with {} axes", config.arm_id, config.axes.len());
//! ```

pub mod arm;
pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
