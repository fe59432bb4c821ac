//! Integration test: four-phase gripper moves on the simulation driver.

use sorter_arm::coordinator::GripperTarget;
use sorter_common::arm::error::ArmError;
use sorter_hal::DriverWrite;

use super::support::{assert_close, rig};

fn pulses(writes: &[DriverWrite]) -> Vec<(u8, f64)> {
    writes
        .iter()
        .filter_map(|w| match *w {
            DriverWrite::Pulse {
                channel,
                pulse_width,
            } => Some((channel, pulse_width)),
            DriverWrite::Digital { .. } => None,
        })
        .collect()
}

#[test]
fn pick_move_runs_the_phases_in_order() {
    let rig = rig();
    rig.arm
        .move_to_position(GripperTarget::new(1500.0, 900.0), false)
        .unwrap();
    let writes = pulses(&rig.driver.writes());

    // Phase 1: elevation and wrist re-asserted where they are.
    let mut first_two = vec![writes[0], writes[1]];
    first_two.sort_by_key(|(ch, _)| *ch);
    assert_eq!(first_two, vec![(18, 1800.0), (24, 1780.0)]);

    // Phase 2: elevation already home, a single write.
    assert_eq!(writes[2], (18, 1800.0));

    // Phase 3 then phase 4, never mixed.
    let rest = &writes[3..];
    let split = rest
        .iter()
        .position(|(ch, _)| *ch == 18 || *ch == 24)
        .unwrap();
    assert!(split > 0);
    assert!(rest[..split].iter().all(|(ch, _)| *ch == 14 || *ch == 15));
    assert!(rest[split..].iter().all(|(ch, _)| *ch == 18 || *ch == 24));
}

#[test]
fn pick_move_lands_on_calibrated_setpoints() {
    let rig = rig();
    let resolved = rig
        .arm
        .move_to_position(GripperTarget::new(1500.0, 900.0), false)
        .unwrap();
    assert_eq!(resolved.reach, 900.0);

    let p = rig.arm.positions();
    assert_eq!(p[0], 1500.0);
    assert_eq!(p[1], 900.0);
    assert_close(p[2], 1760.793);
    assert_close(p[3], 655.82);
    // Auxiliary axis is not part of a gripper move.
    assert_eq!(p[4], 1150.0);
    assert!(rig.driver.pulse_history(25).is_empty());
}

#[test]
fn dropoff_applies_offsets_and_clamps_the_wrist() {
    let rig = rig();
    let resolved = rig
        .arm
        .move_to_position(GripperTarget::new(1800.0, 1100.0), true)
        .unwrap();
    // Resolution is reported before clamping.
    assert_close(resolved.wrist, 293.36);

    let p = rig.arm.positions();
    assert_eq!(p[0], 1800.0);
    assert_eq!(p[1], 800.0);
    assert_close(p[2], 2366.504);
    assert_eq!(p[3], 500.0);
    assert_eq!(rig.driver.pulse_width(24), Some(500.0));
}

#[test]
fn consecutive_moves_lift_elevation_before_swinging() {
    let rig = rig();
    rig.arm
        .move_to_position(GripperTarget::new(1500.0, 900.0), false)
        .unwrap();
    rig.driver.clear_log();
    rig.arm
        .move_to_position(GripperTarget::new(1800.0, 1100.0), true)
        .unwrap();

    let writes = pulses(&rig.driver.writes());
    let first_swing = writes
        .iter()
        .position(|(ch, _)| *ch == 14 || *ch == 15)
        .unwrap();
    // Elevation reached home before rotation or reach moved.
    let last_lift = writes[..first_swing]
        .iter()
        .rev()
        .find(|(ch, _)| *ch == 18)
        .unwrap();
    assert_eq!(last_lift.1, 1800.0);
}

#[test]
fn non_finite_target_rejected_without_motion() {
    let rig = rig();
    let err = rig
        .arm
        .move_to_position(GripperTarget::new(f64::NAN, 900.0), false)
        .unwrap_err();
    assert!(matches!(err, ArmError::InvalidParameter(_)));
    assert!(rig.driver.writes().is_empty());
}

#[test]
fn write_failure_in_phase_three_stops_the_move() {
    let rig = rig();
    rig.driver.fail_next_writes(15, 2);
    let err = rig
        .arm
        .move_to_position(GripperTarget::new(1500.0, 900.0), false)
        .unwrap_err();
    assert!(matches!(err, ArmError::HardwareWriteFailure { axis: 1, .. }));
    // Phase 4 never ran.
    assert_eq!(rig.arm.positions()[2], 1800.0);
    assert_eq!(rig.arm.positions()[3], 1780.0);
}
