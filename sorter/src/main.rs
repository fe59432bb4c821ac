//! # Sorter
//!
//! Runs pick-and-place sessions, training-video recordings and manual moves
//! on the sorter arm.
//!
//! # Usage
//!
//! ```bash
//! # One session on the simulated arm
//! sorter --config config/arm.toml session
//!
//! # Three sessions on the Raspberry Pi outputs
//! sorter --driver rpi session --count 3
//!
//! # Manual moves
//! sorter move-axis --axis 0 --target 1600 --profile dataset
//! sorter move-to --rotation 1500 --distance 900 --dropoff
//!
//! # Verbose JSON logs
//! sorter -v --json init-pose --inference
//! ```
//!
//! Ctrl-C stops motion at the next trajectory step, returns the arm home
//! and releases every servo.

mod local;

use clap::{Parser, Subcommand};
use sorter_arm::session::collaborators::Collaborators;
use sorter_arm::{
    ArmCoordinator, GripperTarget, MagnetActuator, Manipulator, SessionReport, SessionSequencer,
};
use sorter_common::arm::config::ArmConfig;
use sorter_common::config::{ConfigLoader, LogLevel};
use sorter_common::consts::DEFAULT_CONFIG_PATH;
use sorter_common::hal::driver::ServoDriver;
use sorter_hal::{DigitalOutput, DriverRegistry};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::local::{CommandFileInference, DirectoryStore, LocalControlPlane, ShellCamera};

/// Sorter - pick-and-place arm runner
#[derive(Parser, Debug)]
#[command(name = "sorter")]
#[command(version)]
#[command(about = "Pick-and-place session runner for the sorter arm")]
struct Args {
    /// Path to the arm configuration (arm.toml). Defaults are used if the
    /// file does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Servo driver to load (simulation, rpi).
    #[arg(short, long, default_value = "simulation")]
    driver: String,

    /// JSON file with pick/drop pairs.
    #[arg(long, value_name = "FILE", default_value = "commands.json")]
    commands: PathBuf,

    /// Still-picture command; `{path}` is replaced by the output file.
    #[arg(long, default_value = "libcamera-still -n -t 1 -o {path}")]
    still_cmd: String,

    /// Video command, stopped when the sweep ends.
    #[arg(long, default_value = "libcamera-vid -n -t 0 --codec h264 -o {path}")]
    video_cmd: String,

    /// Folder receiving uploaded videos.
    #[arg(long, value_name = "DIR", default_value = "uploads")]
    store: PathBuf,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run pick-and-place sessions.
    Session {
        /// Number of sessions to run back to back.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Record one training video.
    Record,
    /// Move a single axis.
    MoveAxis {
        #[arg(long)]
        axis: usize,
        /// Pulse width [µs].
        #[arg(long)]
        target: f64,
        /// Speed profile name.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Move the gripper over a target.
    MoveTo {
        #[arg(long)]
        rotation: f64,
        #[arg(long)]
        distance: f64,
        /// Apply the drop-off offsets.
        #[arg(long)]
        dropoff: bool,
    },
    /// Take the start pose.
    InitPose {
        /// Inference pose instead of the recording pose.
        #[arg(long)]
        inference: bool,
    },
    /// Release every servo.
    Neutralize,
}

fn main() {
    let args = Args::parse();

    let loaded = if args.config.exists() {
        ArmConfig::load_validated(&args.config).map(Some)
    } else {
        Ok(None)
    };
    let log_level = match &loaded {
        Ok(Some(config)) => config.shared.log_level,
        _ => LogLevel::default(),
    };
    setup_tracing(&args, log_level);

    info!("Sorter v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(Some(config)) => {
            info!("Loaded configuration from {}", args.config.display());
            config
        }
        Ok(None) => {
            warn!(
                "{} not found, using built-in rig defaults",
                args.config.display()
            );
            ArmConfig::default()
        }
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, &config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Sorter shutdown complete");
}

fn run(args: &Args, config: &ArmConfig) -> Result<(), Box<dyn std::error::Error>> {
    log_scheduler();

    let registry = DriverRegistry::with_builtin_drivers();
    info!("Available drivers: {:?}", registry.list_drivers());
    let mut driver = registry.create_driver(&args.driver)?;
    driver.init(&config.hardware())?;
    let driver: Arc<dyn ServoDriver> = Arc::from(driver);

    let arm = Arc::new(ArmCoordinator::new(config, Arc::clone(&driver))?);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let arm = Arc::clone(&arm);
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            interrupted.store(true, Ordering::SeqCst);
            arm.abort();
        })?;
    }

    let result = execute(args, config, &arm, &driver, &interrupted);

    if interrupted.load(Ordering::SeqCst) {
        if let Err(e) = arm.reset() {
            error!("reset after interrupt failed: {}", e);
        }
    }
    let overruns = arm.pacing_overruns();
    if overruns > 0 {
        warn!(overruns, "trajectory steps overran their interval");
    }
    if let Err(e) = driver.shutdown() {
        warn!("driver shutdown: {}", e);
    }
    result
}

fn execute(
    args: &Args,
    config: &ArmConfig,
    arm: &Arc<ArmCoordinator>,
    driver: &Arc<dyn ServoDriver>,
    interrupted: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    match &args.command {
        Command::Session { count } => {
            let mut sequencer = sequencer(args, config, arm, driver)?;
            run_sessions(*count, interrupted, || sequencer.run_session())?;
        }
        Command::Record => {
            let video = sequencer(args, config, arm, driver)?.record_dataset_video()?;
            info!("video recorded: {}", video.display());
        }
        Command::MoveAxis {
            axis,
            target,
            profile,
        } => {
            let end = arm.move_axis(*axis, *target, profile.as_deref())?;
            info!(axis, end, "axis moved");
        }
        Command::MoveTo {
            rotation,
            distance,
            dropoff,
        } => {
            let resolved =
                arm.move_to_position(GripperTarget::new(*rotation, *distance), *dropoff)?;
            info!(?resolved, "gripper in position");
        }
        Command::InitPose { inference } => {
            arm.init_pose(*inference)?;
            info!(inference, "start pose reached");
        }
        Command::Neutralize => arm.neutralize(),
    }
    Ok(())
}

/// Run up to `count` sessions. An abandoned session is logged and the next
/// one still runs; the error lists every abandoned session.
fn run_sessions(
    count: u32,
    interrupted: &AtomicBool,
    mut run_one: impl FnMut() -> SessionReport,
) -> Result<(), String> {
    let mut abandoned = Vec::new();
    for n in 1..=count {
        if interrupted.load(Ordering::SeqCst) {
            warn!("interrupted, {} of {} sessions run", n - 1, count);
            break;
        }
        let report = run_one();
        if report.is_success() {
            info!(
                session = ?report.session_id,
                status = ?report.status,
                commands = report.commands_executed,
                "session {n}/{count} done"
            );
            continue;
        }
        let reason = report
            .error
            .map_or_else(|| "unknown".to_string(), |e| e.to_string());
        error!(
            session = ?report.session_id,
            commands = report.commands_executed,
            failed = ?report.failed_samples,
            "session {n}/{count} abandoned: {reason}"
        );
        abandoned.push(format!("session {n}: {reason}"));
    }
    if abandoned.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} sessions abandoned ({})",
            abandoned.len(),
            count,
            abandoned.join("; ")
        ))
    }
}

fn sequencer(
    args: &Args,
    config: &ArmConfig,
    arm: &Arc<ArmCoordinator>,
    driver: &Arc<dyn ServoDriver>,
) -> Result<SessionSequencer, Box<dyn std::error::Error>> {
    let magnet = MagnetActuator::new(DigitalOutput::new(Arc::clone(driver), config.magnet.pin));
    let collaborators = Collaborators {
        inference: Arc::new(CommandFileInference::new(&args.commands)),
        camera: Arc::new(ShellCamera::new(&args.still_cmd, &args.video_cmd)),
        uploader: Arc::new(DirectoryStore::new(&args.store)),
        control_plane: Arc::new(LocalControlPlane::new(&config.session.sessions_dir)),
    };
    Ok(SessionSequencer::new(
        config,
        Arc::clone(arm) as Arc<dyn Manipulator>,
        Arc::new(magnet),
        collaborators,
    )?)
}

/// Step pacing relies on sleeps; report whether the scheduler helps.
fn log_scheduler() {
    // SAFETY: sched_getscheduler(0) only reads the policy of this process.
    let policy = unsafe { libc::sched_getscheduler(0) };
    match policy {
        libc::SCHED_FIFO | libc::SCHED_RR => info!(policy, "running under a real-time scheduler"),
        p if p < 0 => warn!(
            "sched_getscheduler failed: {}",
            std::io::Error::last_os_error()
        ),
        _ => warn!(policy, "not running under a real-time scheduler, step timing may jitter"),
    }
}

/// Setup tracing subscriber based on CLI arguments and `[shared] log_level`.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match log_level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
