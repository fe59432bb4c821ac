//! Hardware abstraction contract.
//!
//! This module contains the servo/GPIO driver trait and the hardware
//! mapping handed to a driver at initialization.

pub mod config;
pub mod driver;
