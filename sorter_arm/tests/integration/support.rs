//! Shared rigs and recording fakes for the integration tests.

use parking_lot::Mutex;
use sorter_arm::coordinator::{ArmCoordinator, GripperTarget, Manipulator, ResolvedPosition};
use sorter_arm::magnet::Gripper;
use sorter_arm::session::collaborators::{
    Camera, Collaborators, ControlPlane, Inference, PickDropCommand, SampleImage, SessionId,
    Uploader,
};
use sorter_arm::session::state::CaptureStage;
use sorter_common::arm::config::ArmConfig;
use sorter_common::arm::error::{ArmError, CollaboratorError};
use sorter_common::arm::profile::{InterpolationMode, SpeedProfile};
use sorter_hal::{DriverWrite, SimulationDriver};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Config ──────────────────────────────────────────────────────────

/// Default rig with profiles fast enough for tests: a full-range move
/// takes a few milliseconds.
pub fn test_config(tmp: &Path) -> ArmConfig {
    let mut config = ArmConfig::default();
    config.speed_profiles.insert(
        "fast".to_string(),
        SpeedProfile {
            rate: 100_000.0,
            step_frequency_hz: 1000.0,
            mode: InterpolationMode::SineEased,
            step_interval_ms: Some(0.2),
        },
    );
    config.speed_profiles.insert(
        "dataset".to_string(),
        SpeedProfile {
            rate: 50_000.0,
            step_frequency_hz: 500.0,
            mode: InterpolationMode::Linear,
            step_interval_ms: Some(0.2),
        },
    );
    config.session.stabilization_delay_ms = 0;
    config.session.sessions_dir = tmp.join("sessions");
    config.session.recordings_dir = tmp.join("recordings");
    config
}

pub struct Rig {
    pub config: ArmConfig,
    pub driver: Arc<SimulationDriver>,
    pub arm: Arc<ArmCoordinator>,
    pub tmp: TempDir,
}

pub fn rig() -> Rig {
    rig_with(|_| {})
}

pub fn rig_with(adjust: impl FnOnce(&mut ArmConfig)) -> Rig {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    adjust(&mut config);
    let driver = Arc::new(SimulationDriver::with_hardware(&config.hardware()));
    let arm = Arc::new(ArmCoordinator::new(&config, driver.clone()).unwrap());
    Rig {
        config,
        driver,
        arm,
        tmp,
    }
}

/// Servo channels in write order, consecutive duplicates collapsed.
pub fn channel_runs(writes: &[DriverWrite]) -> Vec<u8> {
    let mut runs: Vec<u8> = Vec::new();
    for w in writes {
        if let DriverWrite::Pulse { channel, .. } = *w {
            if runs.last() != Some(&channel) {
                runs.push(channel);
            }
        }
    }
    runs
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

// ── Call log ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenSession(Vec<String>),
    InitPose(bool),
    MoveAxis {
        axis: usize,
        target: f64,
        profile: Option<String>,
    },
    MoveTo {
        target: GripperTarget,
        as_dropoff: bool,
    },
    Reset,
    Neutralize,
    MagnetOn,
    MagnetOff,
    Capture(String),
    Process(String),
    FetchCommands,
    Stitch,
    StartRecording(PathBuf),
    StopRecording,
    Upload { bucket: String, path: PathBuf },
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().iter().filter(|c| pred(c)).count()
    }

    /// Pick/drop protocol calls only (moves, magnet, reset).
    pub fn protocol(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::MoveTo { .. } | Call::MagnetOn | Call::MagnetOff | Call::Reset
                )
            })
            .collect()
    }
}

// ── Manipulator / gripper fakes ─────────────────────────────────────

#[derive(Default)]
pub struct FakeArm {
    pub log: CallLog,
    /// Fail the n-th `move_to_position` call (0-based).
    pub fail_move_to: Option<usize>,
    move_to_calls: Mutex<usize>,
}

impl FakeArm {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }
}

impl Manipulator for FakeArm {
    fn move_axis(&self, axis: usize, target: f64, profile: Option<&str>) -> Result<f64, ArmError> {
        self.log.push(Call::MoveAxis {
            axis,
            target,
            profile: profile.map(str::to_string),
        });
        Ok(target)
    }

    fn move_to_position(
        &self,
        target: GripperTarget,
        as_dropoff: bool,
    ) -> Result<ResolvedPosition, ArmError> {
        self.log.push(Call::MoveTo { target, as_dropoff });
        let mut calls = self.move_to_calls.lock();
        let n = *calls;
        *calls += 1;
        if self.fail_move_to == Some(n) {
            return Err(ArmError::HardwareWriteFailure {
                axis: 1,
                pulse_width: target.distance,
                step: 3,
                source: sorter_common::hal::driver::HalError::CommunicationError("bus".into()),
            });
        }
        Ok(ResolvedPosition {
            rotation: target.rotation,
            reach: target.distance,
            elevation: 0.0,
            wrist: 0.0,
        })
    }

    fn init_pose(&self, for_inference: bool) -> Result<(), ArmError> {
        self.log.push(Call::InitPose(for_inference));
        Ok(())
    }

    fn reset(&self) -> Result<(), ArmError> {
        self.log.push(Call::Reset);
        Ok(())
    }

    fn neutralize(&self) {
        self.log.push(Call::Neutralize);
    }

    fn rotation_axis(&self) -> usize {
        0
    }
}

pub struct FakeGripper {
    log: CallLog,
    on: Mutex<bool>,
}

impl FakeGripper {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            on: Mutex::new(false),
        }
    }
}

impl Gripper for FakeGripper {
    fn on(&self) -> Result<(), ArmError> {
        self.log.push(Call::MagnetOn);
        *self.on.lock() = true;
        Ok(())
    }

    fn off(&self) -> Result<(), ArmError> {
        self.log.push(Call::MagnetOff);
        *self.on.lock() = false;
        Ok(())
    }

    fn is_on(&self) -> bool {
        *self.on.lock()
    }
}

// ── Collaborator fakes ──────────────────────────────────────────────

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

#[derive(Default)]
pub struct FakeCamera {
    pub log: CallLog,
    /// Sample ids whose capture produces no image.
    pub failing: HashSet<String>,
    pub recording_fails: bool,
    /// Runs after every still capture.
    pub after_capture: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Camera for FakeCamera {
    fn capture(&self, path: &Path) -> bool {
        let id = stem(path);
        self.log.push(Call::Capture(id.clone()));
        if self.failing.contains(&id) {
            return false;
        }
        let written = fs::write(path, b"jpeg").is_ok();
        if let Some(hook) = &self.after_capture {
            hook();
        }
        written
    }

    fn start_recording(&self, path: &Path) -> bool {
        self.log.push(Call::StartRecording(path.to_path_buf()));
        if self.recording_fails {
            return false;
        }
        fs::write(path, b"h264").is_ok()
    }

    fn stop_recording(&self) {
        self.log.push(Call::StopRecording);
    }
}

#[derive(Default)]
pub struct FakeInference {
    pub log: CallLog,
    pub commands: Vec<PickDropCommand>,
    /// Sample ids the service reports as unprocessable.
    pub rejecting: HashSet<String>,
    /// Same, for after-sweep pictures only.
    pub rejecting_after: HashSet<String>,
}

impl Inference for FakeInference {
    fn process_sample(&self, image: &SampleImage) -> Result<bool, CollaboratorError> {
        self.log.push(Call::Process(image.sample_id.clone()));
        let rejected = match image.stage {
            CaptureStage::Before => self.rejecting.contains(&image.sample_id),
            CaptureStage::After => self.rejecting_after.contains(&image.sample_id),
        };
        Ok(image.path.exists() && !rejected)
    }

    fn fetch_commands(&self, _session: &SessionId) -> Result<Vec<PickDropCommand>, CollaboratorError> {
        self.log.push(Call::FetchCommands);
        Ok(self.commands.clone())
    }

    fn request_stitch(&self, _session: &SessionId) -> Result<(), CollaboratorError> {
        self.log.push(Call::Stitch);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUploader {
    pub log: CallLog,
    pub fails: bool,
}

impl Uploader for FakeUploader {
    fn upload(&self, bucket: &str, local_path: &Path) -> Result<(), CollaboratorError> {
        self.log.push(Call::Upload {
            bucket: bucket.to_string(),
            path: local_path.to_path_buf(),
        });
        if self.fails {
            Err(CollaboratorError::Unreachable {
                service: "storage".into(),
                reason: "offline".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeControlPlane {
    pub log: CallLog,
    pub offline: bool,
}

impl ControlPlane for FakeControlPlane {
    fn open_session(&self, _arm_id: u32, sample_ids: &[String]) -> Result<SessionId, CollaboratorError> {
        self.log.push(Call::OpenSession(sample_ids.to_vec()));
        if self.offline {
            Err(CollaboratorError::Unreachable {
                service: "control panel".into(),
                reason: "connection refused".into(),
            })
        } else {
            Ok(SessionId::new("sess_test"))
        }
    }
}

/// Fakes sharing one call log. Adjust the public fields before `build()`.
pub struct Fakes {
    pub log: CallLog,
    pub camera: FakeCamera,
    pub inference: FakeInference,
    pub uploader: FakeUploader,
    pub control_plane: FakeControlPlane,
}

impl Fakes {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            camera: FakeCamera {
                log: log.clone(),
                ..Default::default()
            },
            inference: FakeInference {
                log: log.clone(),
                ..Default::default()
            },
            uploader: FakeUploader {
                log: log.clone(),
                ..Default::default()
            },
            control_plane: FakeControlPlane {
                log: log.clone(),
                ..Default::default()
            },
            log,
        }
    }

    pub fn build(self) -> (CallLog, Collaborators) {
        let collaborators = Collaborators {
            inference: Arc::new(self.inference),
            camera: Arc::new(self.camera),
            uploader: Arc::new(self.uploader),
            control_plane: Arc::new(self.control_plane),
        };
        (self.log, collaborators)
    }
}

pub fn pick_drop(pick: (f64, f64), drop: (f64, f64)) -> PickDropCommand {
    PickDropCommand {
        pick: GripperTarget::new(pick.0, pick.1),
        drop: GripperTarget::new(drop.0, drop.1),
    }
}
