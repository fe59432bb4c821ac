//! Raspberry Pi driver.
//!
//! Generates servo pulses with rppal's software PWM on BCM GPIO pins and
//! drives the magnet relay as a plain output pin.

mod driver;

pub use driver::RpiDriver;

use sorter_common::hal::driver::ServoDriver;

/// Factory function for the driver registry.
pub fn create_driver() -> Box<dyn ServoDriver> {
    Box::new(RpiDriver::new())
}
