//! System-wide constants for the sorter workspace.
//!
//! Single source of truth for pulse-width limits and default paths.

/// R/C servo frame rate [Hz]. One pulse every 20 ms.
pub const SERVO_FRAME_HZ: f64 = 50.0;

/// Servo frame period in microseconds.
pub const SERVO_FRAME_PERIOD_US: u64 = 20_000;

/// Smallest pulse width any servo accepts [µs].
pub const MIN_PULSE_WIDTH_US: f64 = 500.0;

/// Largest pulse width any servo accepts [µs].
pub const MAX_PULSE_WIDTH_US: f64 = 2500.0;

/// Pulse width that switches the output off and releases holding torque.
pub const RELEASE_PULSE_WIDTH_US: f64 = 0.0;

/// Maximum number of servo axes on one controller.
pub const MAX_AXES: usize = 16;

/// Speed profile used when a move does not name one.
pub const DEFAULT_SPEED_PROFILE: &str = "fast";

/// Slow profile used while recording training video.
pub const DATASET_SPEED_PROFILE: &str = "dataset";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sorter/arm.toml";

/// Canonical service name (used for logging and thread names).
pub const SERVICE_NAME: &str = "sorter";
