//! Axis actuator: executes trajectories on one servo channel.
//!
//! The actuator is the single owner of an axis' position. The stored value
//! changes only when a trajectory execution ends (completed, cancelled or
//! failed) and always equals the last pulse width the channel accepted.
//!
//! ## Pacing
//!
//! ```text
//! for each setpoint:
//!     write (retry once on failure)
//!     sleep(max(0, step_interval − write_time))
//! ```

use parking_lot::Mutex;
use sorter_common::arm::error::ArmError;
use sorter_common::arm::profile::SpeedProfile;
use sorter_common::hal::config::AxisConfig;
use sorter_common::hal::driver::HalError;
use sorter_hal::PulseChannel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use crate::motion::cancel::CancelToken;
use crate::motion::trajectory::{Trajectory, plan_with_profile};

/// One logical servo.
#[derive(Debug)]
pub struct AxisActuator {
    index: usize,
    config: AxisConfig,
    channel: PulseChannel,
    /// Held for the whole execution of a trajectory.
    motion: Mutex<()>,
    /// `f64` bits of the current pulse width.
    position: AtomicU64,
    overruns: AtomicU64,
}

impl AxisActuator {
    /// Create the axis at its configured home position.
    ///
    /// Nothing is written to the channel until the first move.
    pub fn new(index: usize, config: AxisConfig, channel: PulseChannel) -> Self {
        let home = config.home;
        Self {
            index,
            config,
            channel,
            motion: Mutex::new(()),
            position: AtomicU64::new(home.to_bits()),
            overruns: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[inline]
    pub fn home(&self) -> f64 {
        self.config.home
    }

    /// Current pulse width (last value accepted by the channel).
    #[inline]
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    /// Steps whose write took longer than the step interval.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn store_position(&self, pulse_width: f64) {
        self.position.store(pulse_width.to_bits(), Ordering::Release);
    }

    /// Clamp a commanded target into the axis range, warning when it had to.
    pub fn clamp_target(&self, target: f64) -> f64 {
        let clamped = self.config.clamp(target);
        if clamped != target {
            warn!(
                axis = self.index,
                name = %self.config.name,
                target,
                clamped,
                "target outside [{}, {}], clamped",
                self.config.min_pulse_width,
                self.config.max_pulse_width
            );
        }
        clamped
    }

    /// Plan from the current position to `target` and execute it.
    ///
    /// The start position is read under the axis lock, so a queued move
    /// always starts where the previous one ended.
    ///
    /// # Returns
    /// Final position.
    pub fn move_to(
        &self,
        target: f64,
        profile: &SpeedProfile,
        cancel: &CancelToken,
    ) -> Result<f64, ArmError> {
        if !target.is_finite() {
            return Err(ArmError::InvalidParameter(format!(
                "axis {} target is not finite ({target})",
                self.index
            )));
        }
        let target = self.clamp_target(target);

        let _guard = self.motion.lock();
        let start = self.position();
        let trajectory = plan_with_profile(start, target, profile)?;
        debug!(
            axis = self.index,
            start,
            target,
            steps = trajectory.len(),
            "moving {}",
            self.config.name
        );
        self.run(&trajectory, profile.step_interval(), cancel)
    }

    /// Execute a pre-planned trajectory.
    ///
    /// # Errors
    /// - `ArmError::Cancelled` when `cancel` fires between two steps.
    /// - `ArmError::HardwareWriteFailure` when a write fails twice in a row.
    ///
    /// In both cases the stored position is the last value written.
    pub fn execute(
        &self,
        trajectory: &Trajectory,
        step_interval: Duration,
        cancel: &CancelToken,
    ) -> Result<f64, ArmError> {
        let _guard = self.motion.lock();
        self.run(trajectory, step_interval, cancel)
    }

    /// Caller holds `self.motion`.
    fn run(
        &self,
        trajectory: &Trajectory,
        step_interval: Duration,
        cancel: &CancelToken,
    ) -> Result<f64, ArmError> {
        let mut last_written = self.position();

        for (step, pulse_width) in trajectory.iter().enumerate() {
            if cancel.is_cancelled() {
                self.store_position(last_written);
                warn!(
                    axis = self.index,
                    step,
                    position = last_written,
                    "move of {} cancelled",
                    self.config.name
                );
                return Err(ArmError::Cancelled {
                    axis: self.index,
                    step,
                    position: last_written,
                });
            }

            let started = Instant::now();
            if let Err(source) = self.write_with_retry(pulse_width) {
                self.store_position(last_written);
                error!(
                    axis = self.index,
                    step,
                    pulse_width,
                    position = last_written,
                    "write failed twice on {}: {}",
                    self.config.name,
                    source
                );
                return Err(ArmError::HardwareWriteFailure {
                    axis: self.index,
                    pulse_width,
                    step,
                    source,
                });
            }
            last_written = pulse_width;
            trace!(axis = self.index, step, pulse_width);

            let write_time = started.elapsed();
            match step_interval.checked_sub(write_time) {
                Some(remaining) => thread::sleep(remaining),
                None if !step_interval.is_zero() => {
                    let count = self.overruns.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(
                        axis = self.index,
                        step,
                        write_us = write_time.as_micros() as u64,
                        interval_us = step_interval.as_micros() as u64,
                        overruns = count,
                        "pacing overrun"
                    );
                }
                None => {}
            }
        }

        self.store_position(last_written);
        Ok(last_written)
    }

    fn write_with_retry(&self, pulse_width: f64) -> Result<(), HalError> {
        match self.channel.set_pulse_width(pulse_width) {
            Ok(()) => Ok(()),
            Err(first) => {
                debug!(
                    axis = self.index,
                    pulse_width, "write rejected ({}), retrying", first
                );
                self.channel.set_pulse_width(pulse_width)
            }
        }
    }

    /// Re-write the current position once, cancelling drift picked up while
    /// the servo was released or disturbed.
    pub fn reassert(&self) -> Result<(), ArmError> {
        let _guard = self.motion.lock();
        let position = self.position();
        self.write_with_retry(position)
            .map_err(|source| ArmError::HardwareWriteFailure {
                axis: self.index,
                pulse_width: position,
                step: 0,
                source,
            })
    }

    /// Stop the pulse train. The stored position is kept.
    pub fn release(&self) -> Result<(), HalError> {
        let _guard = self.motion.lock();
        self.channel.release()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
