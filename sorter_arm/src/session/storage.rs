//! On-disk layout of session pictures and training videos.
//!
//! ```text
//! <sessions_dir>/<session_id>/<sample>.jpg          before-sweep
//! <sessions_dir>/<session_id>/after/<sample>.jpg    after-sweep
//! <recordings_dir>/<n>/<unix_secs>.h264             training videos
//! ```
//!
//! Recording sets are numbered folders. A new set is started only when the
//! highest-numbered one already holds files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::session::collaborators::SessionId;
use crate::session::state::CaptureStage;

/// Create (if needed) and return the folder of one session.
pub fn prepare_session_dir(sessions_dir: &Path, session: &SessionId) -> io::Result<PathBuf> {
    let dir = sessions_dir.join(session.as_str());
    fs::create_dir_all(dir.join("after"))?;
    Ok(dir)
}

pub fn sample_path(session_dir: &Path, stage: CaptureStage, sample_id: &str) -> PathBuf {
    let file = format!("{sample_id}.jpg");
    match stage {
        CaptureStage::Before => session_dir.join(file),
        CaptureStage::After => session_dir.join("after").join(file),
    }
}

/// Folder for the next training video.
pub fn next_recording_set(recordings_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(recordings_dir)?;

    let mut highest: Option<u64> = None;
    for entry in fs::read_dir(recordings_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }

    let next = match highest {
        None => 1,
        Some(n) => {
            let last = recordings_dir.join(n.to_string());
            if fs::read_dir(&last)?.next().is_none() {
                return Ok(last);
            }
            n + 1
        }
    };
    let dir = recordings_dir.join(next.to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `<unix seconds>.h264`
pub fn video_file_name(at: SystemTime) -> String {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{secs}.h264")
}
