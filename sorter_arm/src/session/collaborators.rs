//! External collaborators of a session.
//!
//! The arm only talks to cameras, the inference service, object storage
//! and the control plane through these traits. Every method may be called
//! from a worker thread, hence `Send + Sync`.

use serde::{Deserialize, Serialize};
use sorter_common::arm::error::CollaboratorError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::coordinator::GripperTarget;
use crate::session::state::CaptureStage;

/// Identifier handed out by the control plane for one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One captured picture waiting for processing.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleImage {
    pub session_id: SessionId,
    /// Rotation pulse width the picture was taken at, as text.
    pub sample_id: String,
    pub stage: CaptureStage,
    pub path: PathBuf,
}

/// Move one object: pick it up at `pick`, drop it at `drop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(GripperTarget, GripperTarget)", into = "(GripperTarget, GripperTarget)")]
pub struct PickDropCommand {
    pub pick: GripperTarget,
    pub drop: GripperTarget,
}

impl From<(GripperTarget, GripperTarget)> for PickDropCommand {
    fn from((pick, drop): (GripperTarget, GripperTarget)) -> Self {
        Self { pick, drop }
    }
}

impl From<PickDropCommand> for (GripperTarget, GripperTarget) {
    fn from(cmd: PickDropCommand) -> Self {
        (cmd.pick, cmd.drop)
    }
}

/// Object detection and command generation.
pub trait Inference: Send + Sync {
    /// Submit one picture. `Ok(false)` means the service processed the
    /// request but could not use the image.
    fn process_sample(&self, image: &SampleImage) -> Result<bool, CollaboratorError>;

    /// Pick/drop pairs for a session whose pictures were all processed.
    fn fetch_commands(&self, session: &SessionId) -> Result<Vec<PickDropCommand>, CollaboratorError>;

    /// Ask for the overview image of the after-pictures.
    fn request_stitch(&self, session: &SessionId) -> Result<(), CollaboratorError>;
}

/// Still and video camera.
pub trait Camera: Send + Sync {
    /// Take a picture into `path`. Returns false if no image was produced.
    fn capture(&self, path: &Path) -> bool;

    /// Start recording video into `path`.
    fn start_recording(&self, path: &Path) -> bool;

    fn stop_recording(&self);
}

/// Object storage.
pub trait Uploader: Send + Sync {
    fn upload(&self, bucket: &str, local_path: &Path) -> Result<(), CollaboratorError>;
}

/// Session bookkeeping on the operator side.
pub trait ControlPlane: Send + Sync {
    fn open_session(&self, arm_id: u32, sample_ids: &[String]) -> Result<SessionId, CollaboratorError>;
}

/// Everything a sequencer talks to besides the arm.
#[derive(Clone)]
pub struct Collaborators {
    pub inference: Arc<dyn Inference>,
    pub camera: Arc<dyn Camera>,
    pub uploader: Arc<dyn Uploader>,
    pub control_plane: Arc<dyn ControlPlane>,
}
