//! # Serial Communication Module
//!
//! Handles the serial link to the vehicle microcontroller.
//!
//! This module handles:
//! - Locating the microcontroller under `/dev/serial/by-id/`
//! - Opening the port (8N1, no flow control)
//! - Splitting the port into reader and writer halves for the
//!   acquisition and transmit tasks
//!
//! The port is closed when both halves are dropped, on every exit path.

pub mod port_trait;

use std::path::{Path, PathBuf};

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::LinkError;
use port_trait::{split_stream, LinkReader, LinkWriter};

/// Port value that requests auto-discovery
pub const AUTO_PORT: &str = "auto";

/// Serial link to the vehicle microcontroller
pub struct SerialLink {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open the link described by `config`
    ///
    /// With `port = "auto"` the device is looked up in `by_id_dir` by name
    /// pattern; otherwise `port` is opened as given.
    ///
    /// # Errors
    ///
    /// Returns error if no device matches or the port cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shift_cluster::config::Config;
    /// use shift_cluster::serial::SerialLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = Config::load("config/default.toml")?;
    ///     let link = SerialLink::open(&config.serial)?;
    ///     println!("Connected to {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        let path = if config.port == AUTO_PORT {
            discover_device(Path::new(&config.by_id_dir), &config.match_patterns)?
        } else {
            PathBuf::from(&config.port)
        };

        Self::open_path(&path.to_string_lossy(), config.baud_rate)
    }

    /// Open a specific device path
    pub fn open_path(path: &str, baud_rate: u32) -> Result<Self, LinkError> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                path: path.to_string(),
                source,
            })?;

        info!("Opened vehicle link at {}", path);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into reader and writer halves
    pub fn split(self) -> (LinkReader<ReadHalf<SerialStream>>, LinkWriter<WriteHalf<SerialStream>>) {
        split_stream(self.port)
    }
}

/// Find the microcontroller among the entries of `dir`
///
/// Entries are checked in name order; the first whose name contains any of
/// `patterns` is resolved to its real device path.
///
/// # Errors
///
/// Returns `LinkError::NotFound` if the directory is missing or nothing matches.
pub fn discover_device(dir: &Path, patterns: &[String]) -> Result<PathBuf, LinkError> {
    let not_found = || {
        LinkError::NotFound(format!("{} for {}", dir.display(), patterns.join(", ")))
    };

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| {
            debug!("Cannot read {}: {}", dir.display(), e);
            not_found()
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        if !patterns.iter().any(|pattern| name.contains(pattern.as_str())) {
            continue;
        }

        match std::fs::canonicalize(&path) {
            Ok(real_path) => {
                debug!("Matched {} -> {}", path.display(), real_path.display());
                return Ok(real_path);
            }
            Err(e) => debug!("Dangling entry {}: {}", path.display(), e),
        }
    }

    Err(not_found())
}
