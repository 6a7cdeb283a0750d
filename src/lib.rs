//! Capture Monitor - presence-triggered A/V recording for fixed installations.
//!
//! A thermal grid sensor is polled on a fixed cadence; when enough cells
//! read above a temperature threshold the monitor starts an external
//! encoder process, and once absence has persisted past a grace period it
//! stops the encoder gracefully so the output container is finalized. At
//! most one recording session is active at any time.
//!
//! # Architecture
//!
//! ```text
//! timer tick -> ThermalSensor.read_frame() -> PresenceDetector.evaluate()
//!            -> Monitor state machine -> Recorder start/stop -> StatusSink
//! ```
//!
//! The control loop is single-threaded: the absence countdown is a deadline
//! checked against the wall clock on each tick, not a timer thread. The
//! encoder runs as an OS child process and is only touched through
//! bounded-time start/stop/liveness operations.
//!
//! # Example
//!
//! ```no_run
//! use capture_monitor::config::Config;
//! use capture_monitor::monitor::Monitor;
//! use capture_monitor::recorder::rpicam::RpicamLauncher;
//! use capture_monitor::sensor::PlatformSensor;
//! use capture_monitor::status::LogStatusSink;
//!
//! let config = Config::load(&Config::default_path()).expect("config");
//! let sensor = PlatformSensor::open_default().expect("sensor");
//! let mut monitor = Monitor::new(&config, sensor, RpicamLauncher, LogStatusSink);
//!
//! let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);
//! monitor.run(&stop_rx);
//! ```

pub mod config;
pub mod detector;
pub mod monitor;
pub mod recorder;
pub mod sensor;
pub mod status;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, EncoderSettings, Resolution, VideoCodec};
pub use detector::{PresenceDetector, PresenceSignal};
pub use monitor::{Monitor, MonitorState};
pub use recorder::{
    EncoderHandle, EncoderLauncher, Recorder, SessionInfo, SpawnError, StopOutcome,
};
pub use sensor::{SensorError, ThermalFrame, ThermalSensor};
pub use status::{FileStatusSink, LogStatusSink, NullStatusSink, StatusSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
