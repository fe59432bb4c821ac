//! Servo driver trait and error types.
//!
//! This module defines:
//! - `ServoDriver` trait - Interface for pluggable PWM/GPIO backends
//! - `HalError` enum - Error types for driver operations
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Optional driver diagnostics

use crate::consts::{MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US, RELEASE_PULSE_WIDTH_US};
use crate::hal::config::HardwareConfig;
use thiserror::Error;

/// Error types for driver operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Driver used before `init()` succeeded
    #[error("Driver not initialized")]
    NotInitialized,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Channel or pin not claimed at init
    #[error("Unknown output {0}")]
    UnknownOutput(u8),

    /// Pulse width outside the servo range and not the release value
    #[error("Pulse width {pulse_width:.1}us rejected on channel {channel}")]
    InvalidPulseWidth { channel: u8, pulse_width: f64 },
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn ServoDriver>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverDiagnostics {
    /// Pulse-width writes accepted
    pub pulse_writes: u64,
    /// Digital writes accepted
    pub digital_writes: u64,
    /// Writes rejected by the backend
    pub write_failures: u64,
    /// Slowest observed write in microseconds
    pub max_write_latency_us: u64,
}

/// Check a pulse width before it reaches the hardware.
///
/// Accepts the release value (0) or anything inside the servo range.
pub fn check_pulse_width(channel: u8, pulse_width: f64) -> Result<(), HalError> {
    let release = pulse_width == RELEASE_PULSE_WIDTH_US;
    let in_range = (MIN_PULSE_WIDTH_US..=MAX_PULSE_WIDTH_US).contains(&pulse_width);
    if release || in_range {
        Ok(())
    } else {
        Err(HalError::InvalidPulseWidth {
            channel,
            pulse_width,
        })
    }
}

/// Trait defining the interface for servo/GPIO drivers.
///
/// One driver instance drives every servo channel and digital output of the
/// arm. It is constructed once, initialized, then shared as
/// `Arc<dyn ServoDriver>` with every channel handle; writes to distinct
/// channels may arrive concurrently from different worker threads.
///
/// # Lifecycle
///
/// 1. `init()` - Called once with the hardware mapping
/// 2. `set_pulse_width()` / `write_digital()` - Called from motion threads
/// 3. `shutdown()` - Called when the process is stopping
///
/// # Timing Contracts
///
/// | Operation | Max Duration | Constraint |
/// |-----------|--------------|------------|
/// | `init()` | 5 seconds | None |
/// | `set_pulse_width()` | well below one 20 ms servo frame | **Pacing** |
/// | `shutdown()` | 1 second | None |
pub trait ServoDriver: Send + Sync {
    /// Returns the driver's unique identifier (e.g., "simulation", "rpi").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Claim the servo channels and digital outputs listed in `config`.
    ///
    /// # Errors
    /// Return `HalError::InitFailed` if the hardware cannot be opened.
    fn init(&mut self, config: &HardwareConfig) -> Result<(), HalError>;

    /// Emit `pulse_width` microseconds every servo frame on `channel`.
    ///
    /// A pulse width of 0 stops the pulse train and releases the servo.
    fn set_pulse_width(&self, channel: u8, pulse_width: f64) -> Result<(), HalError>;

    /// Drive a digital output high or low.
    fn write_digital(&self, pin: u8, high: bool) -> Result<(), HalError>;

    /// Release hardware resources.
    fn shutdown(&self) -> Result<(), HalError>;

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
