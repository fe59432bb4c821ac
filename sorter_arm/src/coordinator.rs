//! Arm coordinator: multi-axis moves, canonical poses and reset.
//!
//! ## Gripper moves
//!
//! A gripper target is a base rotation plus a distance. The distance maps
//! to a reach pulse width; elevation and wrist follow from the calibration
//! curves so the gripper stays level. Every gripper move runs four phases:
//!
//! ```text
//! 1. re-assert elevation + wrist at their current values   (concurrent)
//! 2. elevation → home                                       (alone)
//! 3. reach + rotation → target                              (concurrent)
//! 4. elevation + wrist → calibrated setpoints               (concurrent)
//! ```
//!
//! Lifting the elevation to home first keeps the gripper clear of objects
//! while the base swings.

use serde::{Deserialize, Serialize};
use sorter_common::arm::calibration::CalibrationProfile;
use sorter_common::arm::config::{ArmConfig, AxisRoles, PoseConfig};
use sorter_common::arm::error::ArmError;
use sorter_common::arm::profile::SpeedProfile;
use sorter_common::config::Validate;
use sorter_common::consts::DEFAULT_SPEED_PROFILE;
use sorter_common::hal::driver::ServoDriver;
use sorter_hal::PulseChannel;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::motion::actuator::AxisActuator;
use crate::motion::cancel::CancelToken;
use crate::motion::pool::WorkerPool;

/// Raw single-axis command.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCommand {
    pub axis: usize,
    pub target: f64,
    /// Speed profile name; `None` selects the default profile.
    pub profile: Option<String>,
}

impl AxisCommand {
    pub fn new(axis: usize, target: f64) -> Self {
        Self {
            axis,
            target,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = Some(profile.to_string());
        self
    }
}

/// Gripper position as produced by the vision pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperTarget {
    /// Base rotation pulse width [µs].
    pub rotation: f64,
    /// Distance from the base, in calibration units.
    pub distance: f64,
}

impl GripperTarget {
    pub fn new(rotation: f64, distance: f64) -> Self {
        Self { rotation, distance }
    }
}

/// Setpoints of all four kinematic axes for one gripper target, before
/// range clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPosition {
    pub rotation: f64,
    pub reach: f64,
    pub elevation: f64,
    pub wrist: f64,
}

/// The operations a session needs from the arm.
pub trait Manipulator: Send + Sync {
    /// Move one axis with a named speed profile (`None` = default).
    fn move_axis(&self, axis: usize, target: f64, profile: Option<&str>) -> Result<f64, ArmError>;

    /// Four-phase gripper move.
    fn move_to_position(
        &self,
        target: GripperTarget,
        as_dropoff: bool,
    ) -> Result<ResolvedPosition, ArmError>;

    /// Start pose for inference pictures or video recording.
    fn init_pose(&self, for_inference: bool) -> Result<(), ArmError>;

    /// Return every axis home, then release all servos. Clears a pending
    /// abort first.
    fn reset(&self) -> Result<(), ArmError>;

    /// Release all servos.
    fn neutralize(&self);

    /// Index of the base rotation axis.
    fn rotation_axis(&self) -> usize;
}

/// Owns every axis of the arm.
pub struct ArmCoordinator {
    axes: Vec<Arc<AxisActuator>>,
    roles: AxisRoles,
    profiles: BTreeMap<String, SpeedProfile>,
    calibration: CalibrationProfile,
    poses: PoseConfig,
    cancel: CancelToken,
    pool: WorkerPool,
}

impl ArmCoordinator {
    /// Build every axis at its home position on top of `driver`.
    ///
    /// The driver must already be initialized with `config.hardware()`.
    pub fn new(config: &ArmConfig, driver: Arc<dyn ServoDriver>) -> Result<Self, ArmError> {
        config
            .validate()
            .map_err(|e| ArmError::InvalidParameter(e.to_string()))?;

        let axes: Vec<_> = config
            .axes
            .iter()
            .enumerate()
            .map(|(idx, axis)| {
                let channel = PulseChannel::new(Arc::clone(&driver), axis.channel);
                Arc::new(AxisActuator::new(idx, axis.clone(), channel))
            })
            .collect();
        let pool = WorkerPool::new("axis", axes.len())?;

        info!(
            "Arm coordinator ready: {} axes ({}), driver '{}'",
            axes.len(),
            axes.iter().map(|a| a.name()).collect::<Vec<_>>().join(", "),
            driver.name()
        );

        Ok(Self {
            axes,
            roles: config.roles,
            profiles: config.speed_profiles.clone(),
            calibration: config.calibration.clone(),
            poses: config.poses,
            cancel: CancelToken::new(),
            pool,
        })
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    #[inline]
    pub fn roles(&self) -> AxisRoles {
        self.roles
    }

    fn axis(&self, idx: usize) -> Result<&Arc<AxisActuator>, ArmError> {
        self.axes.get(idx).ok_or(ArmError::UnknownAxis(idx))
    }

    /// Current pulse width of one axis.
    pub fn position(&self, axis: usize) -> Result<f64, ArmError> {
        Ok(self.axis(axis)?.position())
    }

    /// Current pulse width of every axis, by index.
    pub fn positions(&self) -> Vec<f64> {
        self.axes.iter().map(|a| a.position()).collect()
    }

    /// Token polled by every move of this arm.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop all motion at the next trajectory step.
    pub fn abort(&self) {
        info!("Abort requested");
        self.cancel.cancel();
    }

    /// Accept motion commands again after `abort()`.
    pub fn clear_abort(&self) {
        self.cancel.reset();
    }

    fn profile(&self, name: Option<&str>) -> Result<SpeedProfile, ArmError> {
        let name = name.unwrap_or(DEFAULT_SPEED_PROFILE);
        self.profiles
            .get(name)
            .copied()
            .ok_or_else(|| ArmError::UnknownSpeedProfile(name.to_string()))
    }

    /// Move one axis to `target` with the named profile.
    ///
    /// # Errors
    /// `UnknownAxis`, `UnknownSpeedProfile`, or whatever the execution
    /// returned.
    pub fn move_axis(
        &self,
        axis: usize,
        target: f64,
        profile: Option<&str>,
    ) -> Result<f64, ArmError> {
        let actuator = self.axis(axis)?;
        let profile = self.profile(profile)?;
        actuator.move_to(target, &profile, &self.cancel)
    }

    /// Execute a batch of single-axis commands.
    ///
    /// Sequential batches stop at the first error. Concurrent batches are
    /// dispatched at once and joined; the first error in command order is
    /// returned after every move has ended.
    pub fn move_many(&self, commands: &[AxisCommand], concurrent: bool) -> Result<(), ArmError> {
        // Everything is resolved before the first servo moves.
        let mut resolved = Vec::with_capacity(commands.len());
        for cmd in commands {
            let actuator = Arc::clone(self.axis(cmd.axis)?);
            let profile = self.profile(cmd.profile.as_deref())?;
            resolved.push((actuator, cmd.target, profile));
        }

        if !concurrent || resolved.len() == 1 {
            for (actuator, target, profile) in &resolved {
                actuator.move_to(*target, profile, &self.cancel)?;
            }
            return Ok(());
        }

        let mut seen = HashSet::with_capacity(commands.len());
        if let Some(cmd) = commands.iter().find(|cmd| !seen.insert(cmd.axis)) {
            error!(axis = cmd.axis, "axis commanded twice in one concurrent batch");
            return Err(ArmError::ConflictingAxisCommands { axis: cmd.axis });
        }

        let jobs: Vec<_> = resolved
            .into_iter()
            .map(|(actuator, target, profile)| {
                let cancel = self.cancel.clone();
                move || actuator.move_to(target, &profile, &cancel)
            })
            .collect();

        let mut first_error = None;
        for result in self.pool.run_batch(jobs) {
            if let Err(e) = result.and_then(|inner| inner) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn reassert_concurrently(&self, axes: &[usize]) -> Result<(), ArmError> {
        let jobs: Vec<_> = axes
            .iter()
            .map(|&idx| {
                let actuator = Arc::clone(&self.axes[idx]);
                move || actuator.reassert()
            })
            .collect();
        let mut first_error = None;
        for result in self.pool.run_batch(jobs) {
            if let Err(e) = result.and_then(|inner| inner) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Calibrated setpoints for a gripper target.
    pub fn resolve_position(&self, target: GripperTarget, as_dropoff: bool) -> ResolvedPosition {
        let reach = self.calibration.reach_for(target.distance, as_dropoff);
        let (elevation, wrist) = self.calibration.dependents(reach, as_dropoff);
        ResolvedPosition {
            rotation: target.rotation,
            reach,
            elevation,
            wrist,
        }
    }

    /// Move the gripper over `target` (see module docs for the phases).
    pub fn move_to_position(
        &self,
        target: GripperTarget,
        as_dropoff: bool,
    ) -> Result<ResolvedPosition, ArmError> {
        if !(target.rotation.is_finite() && target.distance.is_finite()) {
            return Err(ArmError::InvalidParameter(format!(
                "gripper target ({}, {}) is not finite",
                target.rotation, target.distance
            )));
        }
        let resolved = self.resolve_position(target, as_dropoff);
        let r = self.roles;
        info!(
            rotation = resolved.rotation,
            reach = resolved.reach,
            elevation = resolved.elevation,
            wrist = resolved.wrist,
            as_dropoff,
            "moving gripper to ({}, {})",
            target.rotation,
            target.distance
        );

        debug!("phase 1: re-assert dependents");
        self.reassert_concurrently(&[r.elevation, r.wrist])?;

        debug!("phase 2: clearance");
        self.move_axis(r.elevation, self.axes[r.elevation].home(), None)?;

        debug!("phase 3: reach + rotation");
        self.move_many(
            &[
                AxisCommand::new(r.reach, resolved.reach),
                AxisCommand::new(r.rotation, resolved.rotation),
            ],
            true,
        )?;

        debug!("phase 4: dependents");
        self.move_many(
            &[
                AxisCommand::new(r.elevation, resolved.elevation),
                AxisCommand::new(r.wrist, resolved.wrist),
            ],
            true,
        )?;

        Ok(resolved)
    }

    /// Take the start pose: elevation to its clearance value alone, then
    /// rotation and reach to the pose values and every other axis home.
    pub fn init_pose(&self, for_inference: bool) -> Result<(), ArmError> {
        let r = self.roles;
        let rotation = if for_inference {
            self.poses.rotation_inference
        } else {
            self.poses.rotation_recording
        };
        info!(for_inference, rotation, "taking start pose");

        self.move_axis(r.elevation, self.poses.elevation_clearance, None)?;

        let commands: Vec<_> = self
            .axes
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != r.elevation)
            .map(|(idx, axis)| {
                let target = if idx == r.rotation {
                    rotation
                } else if idx == r.reach {
                    self.poses.reach
                } else {
                    axis.home()
                };
                AxisCommand::new(idx, target)
            })
            .collect();
        self.move_many(&commands, true)
    }

    /// Elevation home alone, then every other axis home together, then
    /// release all servos. Servos are released even if a move failed.
    ///
    /// A pending `abort()` is cleared first so the homing moves run; an abort
    /// raised while resetting still stops them.
    pub fn reset(&self) -> Result<(), ArmError> {
        let r = self.roles;
        if self.cancel.is_cancelled() {
            info!("clearing abort before reset");
            self.clear_abort();
        }
        info!("resetting arm");
        let result = self
            .move_axis(r.elevation, self.axes[r.elevation].home(), None)
            .and_then(|_| {
                let commands: Vec<_> = self
                    .axes
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != r.elevation)
                    .map(|(idx, axis)| AxisCommand::new(idx, axis.home()))
                    .collect();
                self.move_many(&commands, true)
            });
        if let Err(e) = &result {
            error!("reset incomplete: {}", e);
        }
        self.neutralize();
        result
    }

    /// Stop the pulse train on every channel. Never fails; write errors are
    /// logged.
    pub fn neutralize(&self) {
        for axis in &self.axes {
            if let Err(e) = axis.release() {
                error!(axis = axis.index(), "failed to release {}: {}", axis.name(), e);
            }
        }
        debug!("all servos released");
    }

    /// Total pacing overruns across all axes.
    pub fn pacing_overruns(&self) -> u64 {
        self.axes.iter().map(|a| a.overruns()).sum()
    }
}

impl Manipulator for ArmCoordinator {
    fn move_axis(&self, axis: usize, target: f64, profile: Option<&str>) -> Result<f64, ArmError> {
        ArmCoordinator::move_axis(self, axis, target, profile)
    }

    fn move_to_position(
        &self,
        target: GripperTarget,
        as_dropoff: bool,
    ) -> Result<ResolvedPosition, ArmError> {
        ArmCoordinator::move_to_position(self, target, as_dropoff)
    }

    fn init_pose(&self, for_inference: bool) -> Result<(), ArmError> {
        ArmCoordinator::init_pose(self, for_inference)
    }

    fn reset(&self) -> Result<(), ArmError> {
        ArmCoordinator::reset(self)
    }

    fn neutralize(&self) {
        ArmCoordinator::neutralize(self)
    }

    fn rotation_axis(&self) -> usize {
        self.roles.rotation
    }
}
