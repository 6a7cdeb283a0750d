//! Capture Monitor CLI
//!
//! Presence-triggered A/V recording for fixed installations.

use anyhow::{Context, Result};
use capture_monitor::config::Config;
use capture_monitor::detector::PresenceDetector;
use capture_monitor::monitor::Monitor;
use capture_monitor::recorder::rpicam::RpicamLauncher;
use capture_monitor::sensor::{PlatformSensor, ThermalSensor, GRID_SIDE};
use capture_monitor::status::{FileStatusSink, LogStatusSink, StatusSink};
use capture_monitor::VERSION;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capture-monitor")]
#[command(version = VERSION)]
#[command(about = "Presence-triggered A/V capture monitor", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor loop
    Run,

    /// Check configuration, storage, encoder, and sensor without recording
    Check,

    /// Show the effective configuration
    Config {
        /// Print a complete example configuration instead
        #[arg(long)]
        example: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Run => cmd_run(&config_path),
        Commands::Check => cmd_check(&config_path),
        Commands::Config { example } => cmd_config(&config_path, example),
    }
}

fn cmd_run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    ensure_capture_dir(&config).context("capture directory is not writable")?;

    let sensor = open_sensor(&config).context("initializing thermal sensor")?;

    info!(version = VERSION, "capture monitor starting");
    info!(
        capture_dir = %config.capture_dir.display(),
        threshold_c = config.temperature_threshold,
        pixels_required = config.presence_pixels_required,
        video = %format!("{}@{}fps", config.video_resolution, config.video_framerate),
        audio = %format!("{}Hz {}ch", config.audio_samplerate, config.audio_channels),
        "configuration loaded"
    );

    let status: Box<dyn StatusSink> = match &config.status_file {
        Some(path) => Box::new(FileStatusSink::new(path.clone())),
        None => Box::new(LogStatusSink),
    };

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("installing signal handler")?;

    let mut monitor = Monitor::new(&config, sensor, RpicamLauncher, status);
    monitor.run(&shutdown_rx);
    Ok(())
}

fn cmd_check(config_path: &Path) -> Result<()> {
    println!("Capture Monitor v{VERSION} - preflight checks");
    println!();

    let mut passed = 0;
    let mut total = 0;

    // Configuration
    total += 1;
    let config = match Config::load(config_path) {
        Ok(config) => {
            println!("ok   configuration valid ({})", config_path.display());
            passed += 1;
            Some(config)
        }
        Err(e) => {
            println!("FAIL configuration: {e}");
            println!("     create one with: capture-monitor config --example");
            None
        }
    };

    if let Some(config) = &config {
        // Storage
        total += 1;
        match ensure_capture_dir(config) {
            Ok(()) => {
                println!(
                    "ok   capture directory writable ({})",
                    config.capture_dir.display()
                );
                passed += 1;
            }
            Err(e) => println!("FAIL capture directory: {e}"),
        }

        // Encoder
        total += 1;
        match check_encoder() {
            Ok(version) => {
                println!("ok   encoder found ({version})");
                passed += 1;
            }
            Err(e) => println!("FAIL encoder: {e}"),
        }

        // Sensor
        total += 1;
        match check_sensor(config) {
            Ok(()) => passed += 1,
            Err(e) => println!("FAIL thermal sensor: {e}"),
        }
    }

    println!();
    println!("Passed: {passed}/{total}");
    if passed < total {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_config(config_path: &Path, example: bool) -> Result<()> {
    if example {
        println!("{}", serde_json::to_string_pretty(&Config::example())?);
        return Ok(());
    }

    let config = Config::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    println!("Config file: {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Create the capture directory and probe that it is writable.
fn ensure_capture_dir(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.capture_dir)?;
    let probe = config.capture_dir.join(".write-test");
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)?;
    Ok(())
}

/// Read one frame and dump the thermal map with summary statistics.
fn check_sensor(config: &Config) -> Result<()> {
    let mut sensor = open_sensor(config)?;
    let frame = sensor.read_frame()?;

    println!("ok   thermal sensor read ({}x{} grid)", GRID_SIDE, GRID_SIDE);
    for row in 0..GRID_SIDE {
        let cells: Vec<String> = (0..GRID_SIDE)
            .map(|col| format!("{:5.1}", frame.get(row, col)))
            .collect();
        println!("     {}", cells.join(" "));
    }
    println!(
        "     min {:.1}C  max {:.1}C  mean {:.1}C",
        frame.min_temp(),
        frame.max_temp(),
        frame.mean_temp()
    );

    let detector = PresenceDetector::new(
        config.temperature_threshold,
        config.presence_pixels_required,
    );
    let signal = detector.evaluate(&frame);
    println!(
        "     {} cells at or above {:.1}C -> presence {}",
        signal.hot_pixels,
        config.temperature_threshold,
        if signal.present { "yes" } else { "no" }
    );
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_sensor(config: &Config) -> Result<PlatformSensor, capture_monitor::SensorError> {
    capture_monitor::sensor::Amg8833Sensor::open(
        &config.i2c_bus,
        capture_monitor::sensor::amg8833::DEFAULT_ADDRESS,
    )
}

#[cfg(not(target_os = "linux"))]
fn open_sensor(_config: &Config) -> Result<PlatformSensor, capture_monitor::SensorError> {
    PlatformSensor::open_default()
}

fn check_encoder() -> std::io::Result<String> {
    capture_monitor::recorder::rpicam::encoder_version()
}
