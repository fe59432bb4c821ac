//! Per-output handles bound to the shared driver.
//!
//! A [`PulseChannel`] is what an axis actuator owns; a [`DigitalOutput`] is
//! what the magnet actuator owns. Both are cheap to clone and only forward
//! to the process-wide `ServoDriver`.

use sorter_common::consts::RELEASE_PULSE_WIDTH_US;
use sorter_common::hal::driver::{HalError, ServoDriver};
use std::fmt;
use std::sync::Arc;

/// Servo pulse output for one axis.
#[derive(Clone)]
pub struct PulseChannel {
    driver: Arc<dyn ServoDriver>,
    channel: u8,
}

impl PulseChannel {
    /// Bind `channel` on `driver`.
    pub fn new(driver: Arc<dyn ServoDriver>, channel: u8) -> Self {
        Self { driver, channel }
    }

    /// Output channel number.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Emit `pulse_width` µs every servo frame.
    pub fn set_pulse_width(&self, pulse_width: f64) -> Result<(), HalError> {
        self.driver.set_pulse_width(self.channel, pulse_width)
    }

    /// Stop the pulse train so the servo holds no torque.
    pub fn release(&self) -> Result<(), HalError> {
        self.driver
            .set_pulse_width(self.channel, RELEASE_PULSE_WIDTH_US)
    }
}

impl fmt::Debug for PulseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulseChannel")
            .field("driver", &self.driver.name())
            .field("channel", &self.channel)
            .finish()
    }
}

/// Digital output (magnet relay).
#[derive(Clone)]
pub struct DigitalOutput {
    driver: Arc<dyn ServoDriver>,
    pin: u8,
}

impl DigitalOutput {
    /// Bind `pin` on `driver`.
    pub fn new(driver: Arc<dyn ServoDriver>, pin: u8) -> Self {
        Self { driver, pin }
    }

    /// Output pin number.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Drive the pin high (`true`) or low.
    pub fn set(&self, high: bool) -> Result<(), HalError> {
        self.driver.write_digital(self.pin, high)
    }
}

impl fmt::Debug for DigitalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOutput")
            .field("driver", &self.driver.name())
            .field("pin", &self.pin)
            .finish()
    }
}
