//! Integration test: training-video recording.

use sorter_arm::SessionSequencer;
use sorter_common::arm::error::ArmError;
use std::sync::Arc;
use tempfile::TempDir;

use super::support::{Call, CallLog, FakeArm, FakeGripper, Fakes, test_config};

fn record(fakes: Fakes) -> (Result<std::path::PathBuf, ArmError>, CallLog, TempDir) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (log, collaborators) = fakes.build();
    let mut sequencer = SessionSequencer::new(
        &config,
        Arc::new(FakeArm::new(log.clone())),
        Arc::new(FakeGripper::new(log.clone())),
        collaborators,
    )
    .unwrap();
    let result = sequencer.record_dataset_video();
    (result, log, tmp)
}

#[test]
fn records_sweep_then_uploads_while_returning() {
    let (result, log, tmp) = record(Fakes::new());
    let video = result.unwrap();

    assert_eq!(video.parent(), Some(tmp.path().join("recordings/1").as_path()));
    assert_eq!(video.extension().and_then(|e| e.to_str()), Some("h264"));

    let calls = log.calls();
    assert_eq!(
        &calls[..4],
        &[
            Call::InitPose(false),
            Call::StartRecording(video.clone()),
            Call::MoveAxis {
                axis: 0,
                target: 800.0,
                profile: Some("dataset".into()),
            },
            Call::StopRecording,
        ]
    );
    // Upload and the return to pose overlap; either may be logged first.
    assert_eq!(calls.len(), 6);
    assert!(calls[4..].contains(&Call::InitPose(false)));
    assert!(calls[4..].contains(&Call::Upload {
        bucket: "sorter-training-videos".into(),
        path: video.clone(),
    }));
    assert!(!calls.iter().any(|c| matches!(c, Call::OpenSession(_))));
}

#[test]
fn recording_that_never_starts_skips_the_sweep() {
    let mut fakes = Fakes::new();
    fakes.camera.recording_fails = true;
    let (result, log, _tmp) = record(fakes);

    assert!(matches!(result, Err(ArmError::CaptureFailure(_))));
    assert_eq!(log.count(|c| matches!(c, Call::MoveAxis { .. })), 0);
    assert_eq!(log.count(|c| matches!(c, Call::Upload { .. })), 0);
}

#[test]
fn failed_upload_keeps_the_video() {
    let mut fakes = Fakes::new();
    fakes.uploader.fails = true;
    let (result, log, _tmp) = record(fakes);

    let video = result.unwrap();
    assert!(video.is_file());
    assert_eq!(log.count(|c| matches!(c, Call::Upload { .. })), 1);
}

#[test]
fn second_recording_starts_a_new_set() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (log, collaborators) = Fakes::new().build();
    let mut sequencer = SessionSequencer::new(
        &config,
        Arc::new(FakeArm::new(log.clone())),
        Arc::new(FakeGripper::new(log)),
        collaborators,
    )
    .unwrap();

    let first = sequencer.record_dataset_video().unwrap();
    let second = sequencer.record_dataset_video().unwrap();
    assert!(first.starts_with(tmp.path().join("recordings/1")));
    assert!(second.starts_with(tmp.path().join("recordings/2")));
}
