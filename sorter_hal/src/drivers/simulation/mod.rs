//! Simulation driver module.
//!
//! Records every write in memory instead of driving hardware, with optional
//! write latency and fault injection for exercising the motion core.

mod driver;

pub use driver::{DriverWrite, SimulationDriver};

use sorter_common::hal::driver::ServoDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn ServoDriver> {
    Box::new(SimulationDriver::new())
}
