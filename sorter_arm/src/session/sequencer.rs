//! Session sequencer.
//!
//! Runs one sorting session end to end:
//!
//! 1. open the session with the control plane
//! 2. start pose, picture sweep, inference on every picture
//! 3. fetch pick/drop pairs and execute them
//! 4. start pose, after-sweep, stitching request
//! 5. reset
//!
//! Any failure releases the magnet, skips to the reset and reports the
//! session as abandoned. The reset always runs.
//!
//! Picture processing runs on the collaborator pool so network latency
//! never stretches axis pacing.

use sorter_common::arm::config::{ArmConfig, SessionConfig};
use sorter_common::arm::error::ArmError;
use sorter_common::consts::DATASET_SPEED_PROFILE;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

use crate::coordinator::Manipulator;
use crate::magnet::Gripper;
use crate::motion::pool::{Pending, WorkerPool};
use crate::session::collaborators::{Collaborators, PickDropCommand, SampleImage, SessionId};
use crate::session::state::{
    CaptureStage, SessionEvent, SessionPhase, SessionStateMachine, SessionTransition,
};
use crate::session::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Every pair executed.
    Completed,
    /// Inference found nothing to move. Still a successful session.
    NoCommands,
    /// Stopped early; the arm was reset.
    Abandoned,
}

/// Outcome of [`SessionSequencer::run_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// `None` if the control plane could not open a session.
    pub session_id: Option<SessionId>,
    pub status: SessionStatus,
    /// Every before-sweep picture was captured and processed.
    pub all_success: bool,
    /// Before-sweep samples that failed, in sweep order.
    pub failed_samples: Vec<String>,
    /// After-sweep samples that failed, in sweep order.
    pub after_failed_samples: Vec<String>,
    pub commands_executed: usize,
    /// Magnet on/off commands issued.
    pub magnet_toggles: usize,
    /// Error that ended the session early, or a failed reset.
    pub error: Option<ArmError>,
}

impl SessionReport {
    fn new() -> Self {
        Self {
            session_id: None,
            status: SessionStatus::Abandoned,
            all_success: false,
            failed_samples: Vec::new(),
            after_failed_samples: Vec::new(),
            commands_executed: 0,
            magnet_toggles: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != SessionStatus::Abandoned
    }
}

pub struct SessionSequencer {
    arm: Arc<dyn Manipulator>,
    gripper: Arc<dyn Gripper>,
    collaborators: Collaborators,
    arm_id: u32,
    session: SessionConfig,
    sweep_end: f64,
    machine: SessionStateMachine,
    pool: WorkerPool,
}

impl SessionSequencer {
    pub fn new(
        config: &ArmConfig,
        arm: Arc<dyn Manipulator>,
        gripper: Arc<dyn Gripper>,
        collaborators: Collaborators,
    ) -> Result<Self, ArmError> {
        let pool = WorkerPool::new("collab", config.session.collaborator_workers)?;
        Ok(Self {
            arm,
            gripper,
            collaborators,
            arm_id: config.arm_id,
            session: config.session.clone(),
            sweep_end: config.poses.dataset_sweep_end,
            machine: SessionStateMachine::new(),
            pool,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    fn advance(&mut self, event: SessionEvent) {
        match self.machine.handle_event(event) {
            SessionTransition::Ok(phase) => debug!(?event, ?phase, "session phase"),
            SessionTransition::Rejected(reason) => {
                error!(?event, phase = ?self.machine.phase(), "{}", reason)
            }
        }
    }

    /// Sample ids are the rotation pulse widths of the sweep.
    fn sample_ids(&self) -> Vec<String> {
        self.session
            .sample_positions
            .iter()
            .map(|p| format!("{p:.0}"))
            .collect()
    }

    /// Run one session. Never panics and always leaves the arm reset, also
    /// after an `abort()` stopped it mid-way.
    pub fn run_session(&mut self) -> SessionReport {
        let mut report = SessionReport::new();
        self.advance(SessionEvent::Start);

        if let Err(e) = self.execute(&mut report) {
            error!(session = ?report.session_id, "session abandoned: {}", e);
            if self.gripper.is_on() {
                match self.gripper.off() {
                    Ok(()) => report.magnet_toggles += 1,
                    Err(off_err) => error!("failed to release magnet: {}", off_err),
                }
            }
            self.advance(SessionEvent::Fail);
            report.status = SessionStatus::Abandoned;
            report.error = Some(e);
        }

        if let Err(e) = self.arm.reset() {
            error!("reset after session failed: {}", e);
            report.status = SessionStatus::Abandoned;
            report.error.get_or_insert(e);
        }
        self.advance(SessionEvent::ResetComplete);

        info!(
            session = ?report.session_id,
            status = ?report.status,
            commands = report.commands_executed,
            toggles = report.magnet_toggles,
            "session finished"
        );
        report
    }

    fn execute(&mut self, report: &mut SessionReport) -> Result<(), ArmError> {
        let sample_ids = self.sample_ids();
        let session_id = self
            .collaborators
            .control_plane
            .open_session(self.arm_id, &sample_ids)?;
        info!(session = %session_id, samples = ?sample_ids, "session opened");
        report.session_id = Some(session_id.clone());

        let session_dir = storage::prepare_session_dir(&self.session.sessions_dir, &session_id)
            .map_err(|e| {
                ArmError::CaptureFailure(format!("creating folder for {session_id}: {e}"))
            })?;

        self.arm.init_pose(true)?;
        self.advance(SessionEvent::PoseReady);

        report.failed_samples = self.capture_sweep(&session_id, &session_dir, CaptureStage::Before)?;
        report.all_success = report.failed_samples.is_empty();
        if !report.all_success {
            error!(failed = ?report.failed_samples, "processing failed for some images");
            return Err(ArmError::CaptureFailure(report.failed_samples.join(", ")));
        }

        info!("all images processed, requesting commands");
        let commands = self.collaborators.inference.fetch_commands(&session_id)?;
        if commands.is_empty() {
            warn!("no containers were found");
        }
        for command in &commands {
            self.advance(SessionEvent::NextCommand);
            self.execute_command(command, report)?;
            report.commands_executed += 1;
        }
        self.advance(SessionEvent::CommandsExhausted);
        info!(count = commands.len(), "commands executed");

        self.arm.init_pose(true)?;
        report.after_failed_samples =
            self.capture_sweep(&session_id, &session_dir, CaptureStage::After)?;
        if !report.after_failed_samples.is_empty() {
            warn!(failed = ?report.after_failed_samples, "after pictures incomplete");
        }
        if let Err(e) = self.collaborators.inference.request_stitch(&session_id) {
            warn!("stitching request failed: {}", e);
        }
        self.advance(SessionEvent::AfterCaptured);

        report.status = if commands.is_empty() {
            SessionStatus::NoCommands
        } else {
            SessionStatus::Completed
        };
        Ok(())
    }

    fn execute_command(
        &mut self,
        command: &PickDropCommand,
        report: &mut SessionReport,
    ) -> Result<(), ArmError> {
        self.arm.move_to_position(command.pick, false)?;
        info!(
            "arm at object ({:.0}, {:.0}) for pick up",
            command.pick.rotation, command.pick.distance
        );
        self.advance(SessionEvent::PickReached);

        self.gripper.on()?;
        report.magnet_toggles += 1;
        self.advance(SessionEvent::Gripped);

        self.arm.move_to_position(command.drop, true)?;
        info!(
            "arm at container ({:.0}, {:.0}) for drop off",
            command.drop.rotation, command.drop.distance
        );
        self.advance(SessionEvent::DropReached);

        self.gripper.off()?;
        report.magnet_toggles += 1;
        Ok(())
    }

    /// Take one picture per sample position and submit each for processing.
    ///
    /// # Returns
    /// Failed sample ids in sweep order. Only motion errors abort the sweep.
    fn capture_sweep(
        &self,
        session_id: &SessionId,
        session_dir: &Path,
        stage: CaptureStage,
    ) -> Result<Vec<String>, ArmError> {
        let rotation_axis = self.arm.rotation_axis();
        let sample_ids = self.sample_ids();
        let mut failed: HashSet<String> = HashSet::new();
        let mut pending: Vec<(String, Pending<_>)> = Vec::new();

        for (sample_id, &rotation) in sample_ids.iter().zip(&self.session.sample_positions) {
            self.arm.move_axis(rotation_axis, rotation, None)?;
            debug!(sample = %sample_id, "in position, stabilizing");
            thread::sleep(self.session.stabilization_delay());

            let path = storage::sample_path(session_dir, stage, sample_id);
            if !self.collaborators.camera.capture(&path) {
                warn!(sample = %sample_id, ?stage, "capture failed");
                failed.insert(sample_id.clone());
                continue;
            }
            info!(sample = %sample_id, ?stage, "picture taken");

            let image = SampleImage {
                session_id: session_id.clone(),
                sample_id: sample_id.clone(),
                stage,
                path,
            };
            let inference = Arc::clone(&self.collaborators.inference);
            match self
                .pool
                .submit(format!("process {sample_id}"), move || inference.process_sample(&image))
            {
                Ok(handle) => pending.push((sample_id.clone(), handle)),
                Err(e) => {
                    error!(sample = %sample_id, "could not submit picture: {}", e);
                    failed.insert(sample_id.clone());
                }
            }
        }

        for (sample_id, handle) in pending {
            match handle.wait() {
                Ok(Ok(true)) => debug!(sample = %sample_id, "processed"),
                Ok(Ok(false)) => {
                    warn!(sample = %sample_id, "processing rejected the picture");
                    failed.insert(sample_id);
                }
                Ok(Err(e)) => {
                    warn!(sample = %sample_id, "processing failed: {}", e);
                    failed.insert(sample_id);
                }
                Err(e) => {
                    error!(sample = %sample_id, "{}", e);
                    failed.insert(sample_id);
                }
            }
        }

        Ok(sample_ids
            .into_iter()
            .filter(|id| failed.contains(id))
            .collect())
    }

    /// Record a training video: sweep the base slowly while the camera
    /// records, then upload the video while the arm returns to its
    /// recording pose.
    ///
    /// # Returns
    /// Path of the recorded video.
    pub fn record_dataset_video(&mut self) -> Result<PathBuf, ArmError> {
        let set = storage::next_recording_set(&self.session.recordings_dir)
            .map_err(|e| ArmError::CaptureFailure(format!("recording folder: {e}")))?;
        let video = set.join(storage::video_file_name(SystemTime::now()));

        self.arm.init_pose(false)?;

        if !self.collaborators.camera.start_recording(&video) {
            return Err(ArmError::CaptureFailure(format!(
                "recording {} did not start",
                video.display()
            )));
        }
        info!(path = %video.display(), "recording started");
        let sweep = self.arm.move_axis(
            self.arm.rotation_axis(),
            self.sweep_end,
            Some(DATASET_SPEED_PROFILE),
        );
        self.collaborators.camera.stop_recording();
        sweep?;
        info!("recording finished");

        let uploader = Arc::clone(&self.collaborators.uploader);
        let bucket = self.session.video_bucket.clone();
        let path = video.clone();
        let upload = self
            .pool
            .submit("upload video", move || uploader.upload(&bucket, &path));

        // Upload and return to pose overlap.
        let pose = self.arm.init_pose(false);

        match upload.and_then(Pending::wait) {
            Ok(Ok(())) => info!(bucket = %self.session.video_bucket, "video uploaded"),
            Ok(Err(e)) => warn!("video upload failed: {}", e),
            Err(e) => warn!("video upload lost: {}", e),
        }
        pose?;
        Ok(video)
    }
}
