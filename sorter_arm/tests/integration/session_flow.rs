//! Integration test: session sequencing against recording fakes.

use sorter_arm::coordinator::GripperTarget;
use sorter_arm::session::collaborators::SessionId;
use sorter_arm::session::state::SessionPhase;
use sorter_arm::{SessionReport, SessionSequencer, SessionStatus};
use sorter_common::arm::error::ArmError;
use std::sync::Arc;
use tempfile::TempDir;

use super::support::{Call, CallLog, FakeArm, FakeGripper, Fakes, pick_drop, test_config};

struct Outcome {
    report: SessionReport,
    log: CallLog,
    tmp: TempDir,
}

fn run(fakes: Fakes, sample_positions: &[f64], fail_move_to: Option<usize>) -> Outcome {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.session.sample_positions = sample_positions.to_vec();

    let (log, collaborators) = fakes.build();
    let mut arm = FakeArm::new(log.clone());
    arm.fail_move_to = fail_move_to;
    let gripper = FakeGripper::new(log.clone());

    let mut sequencer =
        SessionSequencer::new(&config, Arc::new(arm), Arc::new(gripper), collaborators).unwrap();
    let report = sequencer.run_session();
    assert_eq!(sequencer.phase(), SessionPhase::Idle);
    Outcome { report, log, tmp }
}

fn is_reset(call: &Call) -> bool {
    matches!(call, Call::Reset)
}

#[test]
fn empty_command_list_is_a_successful_session() {
    let out = run(Fakes::new(), &[1000.0], None);
    let r = &out.report;
    assert_eq!(r.status, SessionStatus::NoCommands);
    assert!(r.is_success());
    assert!(r.all_success);
    assert_eq!(r.magnet_toggles, 0);
    assert_eq!(r.session_id, Some(SessionId::new("sess_test")));
    assert_eq!(out.log.calls().last(), Some(&Call::Reset));
    assert_eq!(out.log.count(is_reset), 1);
    // The after-sweep still runs.
    assert_eq!(out.log.count(|c| matches!(c, Call::Stitch)), 1);
}

#[test]
fn session_opens_with_every_sample_id() {
    let out = run(Fakes::new(), &[1900.0, 1500.0, 1100.0], None);
    assert_eq!(
        out.log.calls()[0],
        Call::OpenSession(vec!["1900".into(), "1500".into(), "1100".into()])
    );
    assert_eq!(out.log.calls()[1], Call::InitPose(true));
    let session = out.tmp.path().join("sessions/sess_test");
    assert!(session.join("1500.jpg").is_file());
    assert!(session.join("after/1500.jpg").is_file());
}

#[test]
fn one_pair_follows_the_pick_and_drop_protocol() {
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];
    let out = run(fakes, &[1000.0], None);

    assert_eq!(out.report.status, SessionStatus::Completed);
    assert_eq!(out.report.commands_executed, 1);
    assert_eq!(out.report.magnet_toggles, 2);
    assert_eq!(
        out.log.protocol(),
        vec![
            Call::MoveTo {
                target: GripperTarget::new(1500.0, 900.0),
                as_dropoff: false
            },
            Call::MagnetOn,
            Call::MoveTo {
                target: GripperTarget::new(1800.0, 1100.0),
                as_dropoff: true
            },
            Call::MagnetOff,
            Call::Reset,
        ]
    );
}

#[test]
fn every_pair_toggles_the_magnet_twice() {
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![
        pick_drop((1500.0, 900.0), (1800.0, 1100.0)),
        pick_drop((1300.0, 1000.0), (900.0, 1100.0)),
    ];
    let out = run(fakes, &[1000.0], None);
    assert_eq!(out.report.commands_executed, 2);
    assert_eq!(out.report.magnet_toggles, 4);
    assert_eq!(out.log.count(|c| matches!(c, Call::MagnetOn)), 2);
}

#[test]
fn capture_failure_abandons_before_any_command() {
    let mut fakes = Fakes::new();
    fakes.camera.failing.insert("1500".into());
    let out = run(fakes, &[1900.0, 1500.0, 1100.0], None);
    let r = &out.report;

    assert_eq!(r.status, SessionStatus::Abandoned);
    assert!(!r.all_success);
    assert_eq!(r.failed_samples, vec!["1500".to_string()]);
    assert!(matches!(&r.error, Some(ArmError::CaptureFailure(msg)) if msg == "1500"));
    assert_eq!(out.log.count(|c| matches!(c, Call::FetchCommands)), 0);
    assert_eq!(out.log.calls().last(), Some(&Call::Reset));
    // The other pictures were still processed.
    assert_eq!(out.log.count(|c| matches!(c, Call::Process(_))), 2);
}

#[test]
fn rejected_picture_abandons_the_session() {
    let mut fakes = Fakes::new();
    fakes.inference.rejecting.insert("1100".into());
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];
    let out = run(fakes, &[1900.0, 1500.0, 1100.0], None);

    assert_eq!(out.report.status, SessionStatus::Abandoned);
    assert_eq!(out.report.failed_samples, vec!["1100".to_string()]);
    assert_eq!(out.log.protocol(), vec![Call::Reset]);
}

#[test]
fn unreachable_control_plane_still_resets() {
    let mut fakes = Fakes::new();
    fakes.control_plane.offline = true;
    let out = run(fakes, &[1000.0], None);
    let r = &out.report;

    assert_eq!(r.session_id, None);
    assert_eq!(r.status, SessionStatus::Abandoned);
    assert!(matches!(r.error, Some(ArmError::CollaboratorUnavailable(_))));
    assert_eq!(out.log.calls().len(), 2);
    assert_eq!(out.log.calls().last(), Some(&Call::Reset));
}

#[test]
fn failed_drop_move_releases_the_magnet() {
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![
        pick_drop((1500.0, 900.0), (1800.0, 1100.0)),
        pick_drop((1300.0, 1000.0), (900.0, 1100.0)),
    ];
    // Second move_to_position call is the first drop-off.
    let out = run(fakes, &[1000.0], Some(1));
    let r = &out.report;

    assert_eq!(r.status, SessionStatus::Abandoned);
    assert_eq!(r.commands_executed, 0);
    assert_eq!(r.magnet_toggles, 2);
    assert!(matches!(r.error, Some(ArmError::HardwareWriteFailure { .. })));
    let protocol = out.log.protocol();
    assert_eq!(&protocol[protocol.len() - 2..], &[Call::MagnetOff, Call::Reset]);
    // The second pair never started.
    assert_eq!(out.log.count(|c| matches!(c, Call::MoveTo { .. })), 2);
}

#[test]
fn after_sweep_failures_are_only_recorded() {
    let mut fakes = Fakes::new();
    fakes.inference.rejecting_after.insert("1500".into());
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];
    let out = run(fakes, &[1900.0, 1500.0], None);
    let r = &out.report;

    assert_eq!(r.status, SessionStatus::Completed);
    assert!(r.all_success);
    assert!(r.failed_samples.is_empty());
    assert_eq!(r.after_failed_samples, vec!["1500".to_string()]);
    assert_eq!(r.error, None);
}

#[test]
fn sweep_visits_sample_positions_in_order() {
    let out = run(Fakes::new(), &[1900.0, 1500.0, 1100.0], None);
    let rotations: Vec<f64> = out
        .log
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::MoveAxis { axis: 0, target, .. } => Some(target),
            _ => None,
        })
        .collect();
    assert_eq!(
        rotations,
        vec![1900.0, 1500.0, 1100.0, 1900.0, 1500.0, 1100.0]
    );
}
