//! Servo driver implementations.
//!
//! - [`simulation`] - In-memory driver for development and tests
//! - `rpi` - Raspberry Pi GPIO driver (linux + `rpi` feature)
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `ServoDriver` trait from `sorter_common::hal::driver`
//! 3. Register the driver in [`register_all_drivers`]

#[cfg(all(target_os = "linux", feature = "rpi"))]
pub mod rpi;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register every driver compiled into this build.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);

    #[cfg(all(target_os = "linux", feature = "rpi"))]
    registry.register("rpi", rpi::create_driver);
}
