//! # Sorter Arm Library
//!
//! Motion core of the pick-and-place arm: converts pulse-width targets into
//! paced per-servo trajectories, coordinates the dependent axes through the
//! calibration curves, and sequences complete sorting sessions around the
//! camera, inference and storage collaborators.
//!
//! ## Layers
//!
//! 1. **motion**: `plan()`, `AxisActuator`, `WorkerPool`, `CancelToken`
//! 2. **coordinator**: `ArmCoordinator`: multi-axis moves, poses, reset
//! 3. **magnet**: `MagnetActuator`: gripper on/off
//! 4. **session**: `SessionSequencer`: capture → infer → pick/drop → reset
//!
//! ## Threading
//!
//! Pacing sleeps run on OS threads owned by long-lived worker pools. Each
//! axis is guarded by its own mutex for the whole duration of a move, so a
//! servo never receives interleaved setpoints from two trajectories.

pub mod coordinator;
pub mod magnet;
pub mod motion;
pub mod session;

pub use coordinator::{ArmCoordinator, AxisCommand, GripperTarget, Manipulator, ResolvedPosition};
pub use magnet::{Gripper, MagnetActuator};
pub use motion::cancel::CancelToken;
pub use motion::trajectory::{Trajectory, plan, plan_with_profile};
pub use session::sequencer::{SessionReport, SessionSequencer, SessionStatus};
