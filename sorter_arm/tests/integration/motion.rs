//! Integration test: single- and multi-axis moves on the simulation driver.

use sorter_arm::coordinator::AxisCommand;
use sorter_common::arm::error::ArmError;
use sorter_common::arm::profile::{InterpolationMode, SpeedProfile};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::support::{channel_runs, rig, rig_with};

fn with_slow_profile(config: &mut sorter_common::arm::config::ArmConfig) {
    config.speed_profiles.insert(
        "slow".to_string(),
        SpeedProfile {
            rate: 2_000.0,
            step_frequency_hz: 200.0,
            mode: InterpolationMode::Linear,
            step_interval_ms: Some(2.0),
        },
    );
}

#[test]
fn move_axis_ends_exactly_on_target() {
    let rig = rig();
    let end = rig.arm.move_axis(0, 2100.0, None).unwrap();
    assert_eq!(end, 2100.0);
    assert_eq!(rig.arm.position(0).unwrap(), 2100.0);
    assert_eq!(rig.driver.pulse_width(14), Some(2100.0));

    let history = rig.driver.pulse_history(14);
    assert!(history.len() > 2);
    assert!(history.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn move_to_current_position_asserts_it_once() {
    let rig = rig();
    rig.arm.move_axis(0, 1425.0, None).unwrap();
    assert_eq!(rig.driver.pulse_history(14), vec![1425.0]);
}

#[test]
fn concurrent_batch_returns_after_every_axis_arrived() {
    let rig = rig();
    let commands = [
        AxisCommand::new(0, 1900.0),
        AxisCommand::new(1, 1600.0),
        AxisCommand::new(3, 1200.0),
        AxisCommand::new(4, 2000.0),
    ];
    rig.arm.move_many(&commands, true).unwrap();

    assert_eq!(rig.arm.positions(), vec![1900.0, 1600.0, 1800.0, 1200.0, 2000.0]);
    for (channel, target) in [(14, 1900.0), (15, 1600.0), (24, 1200.0), (25, 2000.0)] {
        assert_eq!(rig.driver.pulse_width(channel), Some(target));
    }
    // Elevation was not part of the batch.
    assert!(rig.driver.pulse_history(18).is_empty());
}

#[test]
fn concurrent_batch_interleaves_axes() {
    let rig = rig_with(with_slow_profile);
    let commands = [
        AxisCommand::new(0, 1825.0).with_profile("slow"),
        AxisCommand::new(1, 900.0).with_profile("slow"),
    ];
    rig.arm.move_many(&commands, true).unwrap();
    // 40 steps each at 2ms: both must be on the bus at the same time.
    assert!(channel_runs(&rig.driver.writes()).len() > 2);
}

#[test]
fn sequential_batch_finishes_each_axis_first() {
    let rig = rig_with(with_slow_profile);
    let commands = [
        AxisCommand::new(0, 1825.0).with_profile("slow"),
        AxisCommand::new(1, 900.0).with_profile("slow"),
    ];
    rig.arm.move_many(&commands, false).unwrap();
    assert_eq!(channel_runs(&rig.driver.writes()), vec![14, 15]);
}

#[test]
fn failing_axis_does_not_stop_the_rest_of_the_batch() {
    let rig = rig();
    rig.driver.fail_next_writes(15, 2);
    let err = rig
        .arm
        .move_many(
            &[AxisCommand::new(0, 1900.0), AxisCommand::new(1, 1600.0)],
            true,
        )
        .unwrap_err();
    assert!(matches!(err, ArmError::HardwareWriteFailure { axis: 1, step: 0, .. }));
    assert_eq!(rig.arm.position(0).unwrap(), 1900.0);
    assert_eq!(rig.arm.position(1).unwrap(), 500.0);
}

#[test]
fn one_axis_never_runs_two_trajectories_at_once() {
    let rig = rig_with(with_slow_profile);
    let arm = Arc::clone(&rig.arm);
    let other = thread::spawn(move || arm.move_axis(0, 1625.0, Some("slow")));
    rig.arm.move_axis(0, 1225.0, Some("slow")).unwrap();
    other.join().unwrap().unwrap();

    // Each trajectory is written out whole: exactly one reversal.
    let mut history = rig.driver.pulse_history(14);
    history.dedup();
    let reversals = history
        .windows(3)
        .filter(|w| (w[1] - w[0]) * (w[2] - w[1]) < 0.0)
        .count();
    assert_eq!(reversals, 1, "{history:?}");
    let end = rig.arm.position(0).unwrap();
    assert!(end == 1625.0 || end == 1225.0);
}

#[test]
fn abort_stops_motion_between_steps() {
    let rig = rig_with(with_slow_profile);
    let arm = Arc::clone(&rig.arm);
    let mover = thread::spawn(move || arm.move_axis(1, 1500.0, Some("slow")));

    thread::sleep(Duration::from_millis(20));
    rig.arm.abort();
    let err = mover.join().unwrap().unwrap_err();

    let ArmError::Cancelled { axis, position, .. } = err else {
        panic!("expected cancel, got {err:?}");
    };
    assert_eq!(axis, 1);
    assert!(position > 500.0 && position < 1500.0);
    assert_eq!(rig.arm.position(1).unwrap(), position);
    assert_eq!(rig.driver.pulse_width(15), Some(position));

    rig.arm.clear_abort();
    rig.arm.move_axis(1, 1500.0, None).unwrap();
    assert_eq!(rig.arm.position(1).unwrap(), 1500.0);
}

#[test]
fn unknown_profile_is_not_silently_replaced() {
    let rig = rig();
    assert_eq!(
        rig.arm.move_axis(0, 1500.0, Some("Fast")),
        Err(ArmError::UnknownSpeedProfile("Fast".into()))
    );
    assert!(rig.driver.writes().is_empty());
}
