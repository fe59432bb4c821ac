//! Top-level arm configuration (`arm.toml`).
//!
//! Every section has defaults matching the physical five-servo rig, so an
//! `arm.toml` only needs the values that differ.
//!
//! ```toml
//! arm_id = 3
//!
//! [shared]
//! log_level = "debug"
//!
//! [[axes]]
//! name = "rotation"
//! channel = 14
//! home = 1425.0
//!
//! [speed_profiles.fast]
//! rate = 700.0
//! step_frequency_hz = 50.0
//! mode = "sine_eased"
//! ```

use crate::arm::calibration::CalibrationProfile;
use crate::arm::profile::SpeedProfile;
use crate::config::{ConfigError, SharedConfig, Validate};
use crate::consts::{DATASET_SPEED_PROFILE, DEFAULT_SPEED_PROFILE, MAX_AXES};
use crate::hal::config::{AxisConfig, HardwareConfig, MagnetConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

fn default_arm_id() -> u32 {
    1
}

fn default_axes() -> Vec<AxisConfig> {
    vec![
        AxisConfig::new("rotation", 14, 1425.0),
        AxisConfig::new("reach", 15, 500.0),
        AxisConfig::new("elevation", 18, 1800.0),
        AxisConfig::new("wrist", 24, 1780.0),
        AxisConfig::new("aux", 25, 1150.0),
    ]
}

fn default_speed_profiles() -> BTreeMap<String, SpeedProfile> {
    BTreeMap::from([
        (DEFAULT_SPEED_PROFILE.to_string(), SpeedProfile::FAST),
        (DATASET_SPEED_PROFILE.to_string(), SpeedProfile::DATASET),
    ])
}

/// Which configured axis plays which kinematic role (`[roles]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRoles {
    /// Base rotation.
    pub rotation: usize,
    /// Reach (master of the dependent pair).
    pub reach: usize,
    /// First dependent axis, also cleared to home before reach moves.
    pub elevation: usize,
    /// Second dependent axis.
    pub wrist: usize,
}

impl Default for AxisRoles {
    fn default() -> Self {
        Self {
            rotation: 0,
            reach: 1,
            elevation: 2,
            wrist: 3,
        }
    }
}

impl AxisRoles {
    pub fn validate(&self, axis_count: usize) -> Result<(), ConfigError> {
        let roles = [self.rotation, self.reach, self.elevation, self.wrist];
        if let Some(bad) = roles.iter().find(|&&idx| idx >= axis_count) {
            return Err(ConfigError::ValidationError(format!(
                "role references axis {bad}, only {axis_count} axes configured"
            )));
        }
        let unique: HashSet<_> = roles.iter().collect();
        if unique.len() != roles.len() {
            return Err(ConfigError::ValidationError(
                "roles must reference four distinct axes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Canonical poses (`[poses]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Elevation lifted clear before the start pose is taken.
    pub elevation_clearance: f64,
    /// Rotation when taking inference pictures.
    pub rotation_inference: f64,
    /// Rotation at the start of a training-video sweep.
    pub rotation_recording: f64,
    /// Reach in the start pose.
    pub reach: f64,
    /// Rotation at the end of the training-video sweep.
    pub dataset_sweep_end: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            elevation_clearance: 1810.0,
            rotation_inference: 2000.0,
            rotation_recording: 2200.0,
            reach: 1200.0,
            dataset_sweep_end: 800.0,
        }
    }
}

/// Session sequencing (`[session]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rotation pulse widths where inference pictures are taken, in order.
    pub sample_positions: Vec<f64>,
    /// Settle time after reaching a sample position [ms].
    pub stabilization_delay_ms: u64,
    /// Root directory for session image folders.
    pub sessions_dir: PathBuf,
    /// Root directory for training-video folders.
    pub recordings_dir: PathBuf,
    /// Bucket receiving training videos.
    pub video_bucket: String,
    /// Worker threads for inference submission and uploads.
    pub collaborator_workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_positions: vec![1000.0],
            stabilization_delay_ms: 750,
            sessions_dir: PathBuf::from("sessions"),
            recordings_dir: PathBuf::from("recordings"),
            video_bucket: "sorter-training-videos".to_string(),
            collaborator_workers: 2,
        }
    }
}

impl SessionConfig {
    pub fn stabilization_delay(&self) -> Duration {
        Duration::from_millis(self.stabilization_delay_ms)
    }
}

/// Complete arm configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    #[serde(default)]
    pub shared: SharedConfig,

    /// Identifier reported to the control plane.
    #[serde(default = "default_arm_id")]
    pub arm_id: u32,

    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,

    #[serde(default)]
    pub roles: AxisRoles,

    #[serde(default = "default_speed_profiles")]
    pub speed_profiles: BTreeMap<String, SpeedProfile>,

    #[serde(default)]
    pub calibration: CalibrationProfile,

    #[serde(default)]
    pub poses: PoseConfig,

    #[serde(default)]
    pub magnet: MagnetConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            arm_id: default_arm_id(),
            axes: default_axes(),
            roles: AxisRoles::default(),
            speed_profiles: default_speed_profiles(),
            calibration: CalibrationProfile::default(),
            poses: PoseConfig::default(),
            magnet: MagnetConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ArmConfig {
    /// Outputs the driver has to claim.
    pub fn hardware(&self) -> HardwareConfig {
        HardwareConfig::new(&self.axes, &[self.magnet.pin])
    }
}

impl Validate for ArmConfig {
    /// # Validation Rules
    /// 1. shared section valid
    /// 2. 1..=MAX_AXES axes, each valid, unique names and channels
    /// 3. magnet pin not shared with a servo channel
    /// 4. roles reference distinct, existing axes
    /// 5. the default profile exists and every profile is valid
    /// 6. calibration finite, at least one sample position, at least one worker
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.axes.is_empty() || self.axes.len() > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "{} axes configured (expected 1..={MAX_AXES})",
                self.axes.len()
            )));
        }

        let mut names = HashSet::new();
        let mut channels = HashSet::new();
        for (idx, axis) in self.axes.iter().enumerate() {
            axis.validate(idx)?;
            if !names.insert(axis.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate axis name: {}",
                    axis.name
                )));
            }
            if !channels.insert(axis.channel) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate servo channel: {}",
                    axis.channel
                )));
            }
        }
        if channels.contains(&self.magnet.pin) {
            return Err(ConfigError::ValidationError(format!(
                "magnet pin {} is also a servo channel",
                self.magnet.pin
            )));
        }

        self.roles.validate(self.axes.len())?;

        if !self.speed_profiles.contains_key(DEFAULT_SPEED_PROFILE) {
            return Err(ConfigError::ValidationError(format!(
                "speed profile '{DEFAULT_SPEED_PROFILE}' must be defined"
            )));
        }
        for (name, profile) in &self.speed_profiles {
            profile.validate(name)?;
        }

        self.calibration.validate()?;

        if self.session.sample_positions.is_empty() {
            return Err(ConfigError::ValidationError(
                "session.sample_positions cannot be empty".to_string(),
            ));
        }
        if self.session.collaborator_workers == 0 {
            return Err(ConfigError::ValidationError(
                "session.collaborator_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
