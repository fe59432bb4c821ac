//! Error taxonomy for motion and session handling.
//!
//! | Variant | Scope | Policy |
//! |---------|-------|--------|
//! | `InvalidParameter` | one move | move rejected, reported |
//! | `UnknownAxis` / `UnknownSpeedProfile` | session | configuration/programming error |
//! | `ConflictingAxisCommands` | one batch | rejected before any motion |
//! | `HardwareWriteFailure` | one move | retried once, then aborted |
//! | `Cancelled` | one move | position = last written value |
//! | `CaptureFailure` | one sample | recorded, session continues |
//! | `CollaboratorUnavailable` | session | session abandoned, arm reset |

use crate::hal::driver::HalError;
use thiserror::Error;

/// Errors raised by the motion core and the session sequencer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArmError {
    /// Non-positive rate/frequency or a non-finite setpoint.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Axis index not configured.
    #[error("unknown axis {0}")]
    UnknownAxis(usize),

    /// Speed profile name not registered.
    #[error("unknown speed profile '{0}'")]
    UnknownSpeedProfile(String),

    /// The same axis appears twice in one concurrent batch.
    #[error("axis {axis} commanded more than once in a concurrent batch")]
    ConflictingAxisCommands { axis: usize },

    /// Channel write rejected twice in a row.
    #[error("write of {pulse_width:.1}us failed on axis {axis} at step {step}: {source}")]
    HardwareWriteFailure {
        axis: usize,
        pulse_width: f64,
        step: usize,
        source: HalError,
    },

    /// Motion curtailed between two steps.
    #[error("axis {axis} cancelled at step {step}, holding {position:.1}us")]
    Cancelled {
        axis: usize,
        step: usize,
        position: f64,
    },

    /// Camera did not produce an image.
    #[error("capture failed for sample {0}")]
    CaptureFailure(String),

    /// Network-backed collaborator could not be reached.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Digital output (magnet) write failed.
    #[error("gripper output failed: {0}")]
    Gripper(HalError),

    /// A motion worker exited before reporting its result.
    #[error("motion worker lost: {0}")]
    WorkerLost(String),
}

impl ArmError {
    /// Errors caused by configuration or programming mistakes rather than
    /// the physical rig.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ArmError::UnknownAxis(_)
                | ArmError::UnknownSpeedProfile(_)
                | ArmError::ConflictingAxisCommands { .. }
        )
    }

    /// Axis the error refers to, when there is one.
    pub fn axis(&self) -> Option<usize> {
        match self {
            ArmError::UnknownAxis(axis)
            | ArmError::ConflictingAxisCommands { axis }
            | ArmError::HardwareWriteFailure { axis, .. }
            | ArmError::Cancelled { axis, .. } => Some(*axis),
            _ => None,
        }
    }
}

/// Failure reported by an external collaborator (inference, storage,
/// control plane).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// Service could not be reached.
    #[error("{service} unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    /// Service answered but refused the request.
    #[error("{service} rejected request: {reason}")]
    Rejected { service: String, reason: String },

    /// Local file handling failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<CollaboratorError> for ArmError {
    fn from(err: CollaboratorError) -> Self {
        ArmError::CollaboratorUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        CollaboratorError::Io(err.to_string())
    }
}
