//! Stand-alone collaborators for running the arm without the cloud services.
//!
//! - [`CommandFileInference`]: pick/drop pairs come from a JSON file
//! - [`ShellCamera`]: pictures and videos come from external commands
//! - [`DirectoryStore`]: uploads are copies into a local folder
//! - [`LocalControlPlane`]: session ids are generated locally

use parking_lot::Mutex;
use sorter_arm::session::collaborators::{
    Camera, ControlPlane, Inference, PickDropCommand, SampleImage, SessionId, Uploader,
};
use sorter_common::arm::error::CollaboratorError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Placeholder replaced by the output path in camera command templates.
const PATH_PLACEHOLDER: &str = "{path}";

// ─── Inference ──────────────────────────────────────────────────────

/// Reads pick/drop pairs from a JSON file:
///
/// ```json
/// [[{"rotation": 1500, "distance": 900}, {"rotation": 1800, "distance": 1100}]]
/// ```
///
/// Pictures count as processed when the file exists and is not empty.
pub struct CommandFileInference {
    path: PathBuf,
}

impl CommandFileInference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Inference for CommandFileInference {
    fn process_sample(&self, image: &SampleImage) -> Result<bool, CollaboratorError> {
        let len = fs::metadata(&image.path)?.len();
        debug!(sample = %image.sample_id, bytes = len, "sample checked");
        Ok(len > 0)
    }

    fn fetch_commands(&self, session: &SessionId) -> Result<Vec<PickDropCommand>, CollaboratorError> {
        let content = fs::read_to_string(&self.path)?;
        let commands: Vec<PickDropCommand> =
            serde_json::from_str(&content).map_err(|e| CollaboratorError::Rejected {
                service: "inference".to_string(),
                reason: format!("{}: {e}", self.path.display()),
            })?;
        info!(%session, count = commands.len(), "commands loaded from {}", self.path.display());
        Ok(commands)
    }

    fn request_stitch(&self, session: &SessionId) -> Result<(), CollaboratorError> {
        info!(%session, "no stitching service, skipped");
        Ok(())
    }
}

// ─── Camera ─────────────────────────────────────────────────────────

/// Runs external commands such as `libcamera-still -n -o {path}`.
pub struct ShellCamera {
    still: Vec<String>,
    video: Vec<String>,
    recording: Mutex<Option<Child>>,
}

impl ShellCamera {
    /// `still` and `video` are whitespace-separated templates containing
    /// `{path}`.
    pub fn new(still: &str, video: &str) -> Self {
        let split = |t: &str| -> Vec<String> { t.split_whitespace().map(str::to_string).collect() };
        Self {
            still: split(still),
            video: split(video),
            recording: Mutex::new(None),
        }
    }

    fn command(template: &[String], path: &Path) -> Option<Command> {
        let (program, args) = template.split_first()?;
        let path = path.to_string_lossy();
        let mut cmd = Command::new(program);
        cmd.args(args.iter().map(|a| a.replace(PATH_PLACEHOLDER, &path)))
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        Some(cmd)
    }
}

impl Camera for ShellCamera {
    fn capture(&self, path: &Path) -> bool {
        let Some(mut cmd) = Self::command(&self.still, path) else {
            warn!("no still command configured");
            return false;
        };
        match cmd.status() {
            Ok(status) if status.success() => path.is_file(),
            Ok(status) => {
                warn!(path = %path.display(), "still command exited with {}", status);
                false
            }
            Err(e) => {
                warn!("still command failed to start: {}", e);
                false
            }
        }
    }

    fn start_recording(&self, path: &Path) -> bool {
        let Some(mut cmd) = Self::command(&self.video, path) else {
            warn!("no video command configured");
            return false;
        };
        let mut recording = self.recording.lock();
        if recording.is_some() {
            warn!("a recording is already running");
            return false;
        }
        match cmd.spawn() {
            Ok(child) => {
                *recording = Some(child);
                true
            }
            Err(e) => {
                warn!("video command failed to start: {}", e);
                false
            }
        }
    }

    fn stop_recording(&self) {
        let Some(mut child) = self.recording.lock().take() else {
            return;
        };
        if let Err(e) = child.kill() {
            debug!("video command already exited: {}", e);
        }
        if let Err(e) = child.wait() {
            warn!("waiting for video command: {}", e);
        }
    }
}

// ─── Uploads ────────────────────────────────────────────────────────

/// Copies `<dir>/<file>` to `<root>/<bucket>/<dir name>/<file>`.
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn destination(&self, bucket: &str, local_path: &Path) -> Result<PathBuf, CollaboratorError> {
        let file = local_path.file_name().ok_or_else(|| {
            CollaboratorError::Io(format!("{} has no file name", local_path.display()))
        })?;
        let mut dest = self.root.join(bucket);
        if let Some(parent) = local_path.parent().and_then(Path::file_name) {
            dest.push(parent);
        }
        Ok(dest.join(file))
    }
}

impl Uploader for DirectoryStore {
    fn upload(&self, bucket: &str, local_path: &Path) -> Result<(), CollaboratorError> {
        let dest = self.destination(bucket, local_path)?;
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = fs::copy(local_path, &dest)?;
        info!(bytes, "stored {} as {}", local_path.display(), dest.display());
        Ok(())
    }
}

// ─── Control plane ──────────────────────────────────────────────────

/// Issues `sess_<unix seconds>` ids and creates the session folder. A
/// second session in the same second gets `sess_<unix seconds>_<n>`.
pub struct LocalControlPlane {
    sessions_dir: PathBuf,
}

impl LocalControlPlane {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }
}

impl ControlPlane for LocalControlPlane {
    fn open_session(&self, arm_id: u32, sample_ids: &[String]) -> Result<SessionId, CollaboratorError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        fs::create_dir_all(&self.sessions_dir)?;
        let base = format!("sess_{secs}");
        let mut id = SessionId::new(base.clone());
        let mut suffix = 0u32;
        // create_dir fails on an existing folder, so ids are never shared.
        while let Err(e) = fs::create_dir(self.sessions_dir.join(id.as_str())) {
            if e.kind() != io::ErrorKind::AlreadyExists {
                return Err(e.into());
            }
            suffix += 1;
            id = SessionId::new(format!("{base}_{suffix}"));
        }
        info!(arm_id, session = %id, samples = sample_ids.len(), "local session opened");
        Ok(id)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
