//! # Sorter HAL Library
//!
//! Servo PWM and digital-output backends for the sorter arm.
//!
//! Drivers implement the `ServoDriver` trait defined in
//! `sorter_common::hal::driver`. One driver instance is created per process
//! and shared through [`PulseChannel`] and [`DigitalOutput`] handles, so the
//! motion code never reaches for the hardware directly.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations (simulation, Raspberry Pi)
//! - [`channel`] - Per-output handles bound to a shared driver
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ PulseChannel │   │ DigitalOutput│   (one per axis / magnet)
//! └──────┬───────┘   └──────┬───────┘
//!        │                  │
//!        ▼                  ▼
//!   ┌─────────────────────────────┐
//!   │  Arc<dyn ServoDriver>       │   (one per process)
//!   └─────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod driver_registry;
pub mod drivers;

// Re-export key types for convenience
pub use crate::channel::{DigitalOutput, PulseChannel};
pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::{DriverWrite, SimulationDriver};
