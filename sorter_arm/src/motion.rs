//! Single-axis motion: trajectory planning, paced execution, worker threads
//! and cooperative cancellation.

pub mod actuator;
pub mod cancel;
pub mod pool;
pub mod trajectory;
