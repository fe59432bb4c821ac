//! Electromagnet gripper.

use sorter_common::arm::error::ArmError;
use sorter_hal::DigitalOutput;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Binary gripper seam used by the session sequencer.
pub trait Gripper: Send + Sync {
    fn on(&self) -> Result<(), ArmError>;
    fn off(&self) -> Result<(), ArmError>;
    /// Last commanded state (there is no feedback).
    fn is_on(&self) -> bool;
}

/// Magnet driven by one digital output.
#[derive(Debug)]
pub struct MagnetActuator {
    output: DigitalOutput,
    on: AtomicBool,
}

impl MagnetActuator {
    pub fn new(output: DigitalOutput) -> Self {
        Self {
            output,
            on: AtomicBool::new(false),
        }
    }

    fn set(&self, on: bool) -> Result<(), ArmError> {
        self.output.set(on).map_err(ArmError::Gripper)?;
        self.on.store(on, Ordering::Release);
        info!(pin = self.output.pin(), "magnet {}", if on { "ON" } else { "OFF" });
        Ok(())
    }
}

impl Gripper for MagnetActuator {
    fn on(&self) -> Result<(), ArmError> {
        self.set(true)
    }

    fn off(&self) -> Result<(), ArmError> {
        self.set(false)
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }
}
