//! # Shift Cluster
//!
//! Reads vehicle telemetry from the microcontroller and drives the gear
//! shift servo over the same serial link.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use shift_cluster::config::Config;
use shift_cluster::input::keyboard::KeyboardSource;
use shift_cluster::input::InputSignal;
use shift_cluster::serial::SerialLink;
use shift_cluster::session::{Session, Shutdown};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Capacity of the input signal channel
const INPUT_CHANNEL_CAPACITY: usize = 32;

/// File name prefix of the daily diagnostic log
const LOG_FILE_PREFIX: &str = "shift-cluster.log";

/// Main entry point for Shift Cluster
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging to the console, plus a daily file when telemetry is enabled
///    - Open the serial link and, if enabled, the shift input device
///
/// 2. **Session**
///    - Acquisition, control, transmit and recorder tasks run until Ctrl+C
///      or until the link fails
///
/// 3. **Graceful Shutdown**
///    - All tasks are joined and the link is closed
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The serial port cannot be opened (no microcontroller found)
/// - The link fails during the session
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO shift_cluster: Shift Cluster v0.1.0 starting...
/// INFO shift_cluster::serial: Opened vehicle link at /dev/ttyACM0
/// INFO shift_cluster::session::control: Shift controller running every 20ms
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config);

    info!("Shift Cluster v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let link = SerialLink::open(&config.serial)?;
    info!("Vehicle link opened at: {}", link.device_path());
    let (reader, writer) = link.split();

    let input = if config.input.enabled {
        let keyboard = KeyboardSource::open(&config.input.device_path)?;
        let (tx, rx) = mpsc::channel::<InputSignal>(INPUT_CHANNEL_CAPACITY);
        keyboard
            .spawn(tx)
            .context("Failed to start keyboard reader")?;
        Some(rx)
    } else {
        info!("Shift input disabled");
        None
    };

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down...");
                    shutdown.trigger();
                }
                Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
            }
        });
    }

    info!("Press Ctrl+C to exit");
    Session::new(config)
        .run(reader, writer, input, shutdown)
        .await?;

    info!("Shift Cluster stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file under the telemetry directory
///
/// The returned guard must stay alive for buffered file output to be written.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if config.telemetry.enabled {
        let appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
