//! Integration test: full sessions on the simulated arm and magnet.

use sorter_arm::{MagnetActuator, SessionSequencer, SessionStatus};
use sorter_common::arm::error::ArmError;
use sorter_hal::DigitalOutput;
use std::sync::Arc;

use super::support::{Fakes, Rig, pick_drop, rig};

const CHANNELS: [u8; 5] = [14, 15, 18, 24, 25];
const HOME: [f64; 5] = [1425.0, 500.0, 1800.0, 1780.0, 1150.0];

fn sequencer(rig: &Rig, fakes: Fakes) -> SessionSequencer {
    let (_, collaborators) = fakes.build();
    let magnet = MagnetActuator::new(DigitalOutput::new(
        rig.driver.clone(),
        rig.config.magnet.pin,
    ));
    SessionSequencer::new(
        &rig.config,
        rig.arm.clone(),
        Arc::new(magnet),
        collaborators,
    )
    .unwrap()
}

fn assert_home_and_released(rig: &Rig) {
    assert_eq!(rig.arm.positions(), HOME.to_vec());
    for channel in CHANNELS {
        assert_eq!(rig.driver.pulse_width(channel), Some(0.0));
    }
}

#[test]
fn one_pair_on_the_simulated_arm() {
    let rig = rig();
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];

    let report = sequencer(&rig, fakes).run_session();

    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.magnet_toggles, 2);
    assert_eq!(rig.driver.level_history(23), vec![true, false]);
    assert_home_and_released(&rig);
    // The drop-off clamped the wrist on the way.
    assert!(rig.driver.pulse_history(24).contains(&500.0));
}

#[test]
fn empty_session_returns_home() {
    let rig = rig();
    let report = sequencer(&rig, Fakes::new()).run_session();

    assert_eq!(report.status, SessionStatus::NoCommands);
    assert!(rig.driver.level_history(23).is_empty());
    assert_home_and_released(&rig);
    // Inference pose was taken on the way.
    assert!(rig.driver.pulse_history(14).contains(&2000.0));
}

#[test]
fn magnet_failure_abandons_and_resets() {
    let rig = rig();
    rig.driver.fail_next_writes(23, 1);
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];

    let report = sequencer(&rig, fakes).run_session();

    assert_eq!(report.status, SessionStatus::Abandoned);
    assert_eq!(report.magnet_toggles, 0);
    assert_home_and_released(&rig);
}

#[test]
fn abort_mid_session_still_returns_home() {
    let rig = rig();
    let mut fakes = Fakes::new();
    fakes.inference.commands = vec![pick_drop((1500.0, 900.0), (1800.0, 1100.0))];
    let arm = rig.arm.clone();
    fakes.camera.after_capture = Some(Box::new(move || arm.abort()));

    let report = sequencer(&rig, fakes).run_session();

    assert_eq!(report.status, SessionStatus::Abandoned);
    assert!(matches!(report.error, Some(ArmError::Cancelled { .. })));
    assert_eq!(report.commands_executed, 0);
    assert!(rig.driver.level_history(23).is_empty());
    // The sweep left the base away from home before the abort.
    assert!(rig.driver.pulse_history(14).contains(&1000.0));
    assert_home_and_released(&rig);
    assert!(!rig.arm.cancel_token().is_cancelled());
}
