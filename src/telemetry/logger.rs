//! JSONL telemetry recorder
//!
//! One record per line:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123456Z","current_gear":3,"engine_rpm":4500,...,"clutch_pressed":false,"gear_goal":3}
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::{Result, ShiftClusterError};
use crate::wire::protocol::VehicleSnapshot;

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// A single line of the log
#[derive(Debug, Serialize)]
struct TelemetryRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    snapshot: &'a VehicleSnapshot,
}

/// Rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    files_opened: u64,
}

impl TelemetryLogger {
    /// Create a logger writing into `config.log_dir`
    ///
    /// The directory is created if missing. No file is opened until the
    /// first record arrives.
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Recording telemetry to {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            files_opened: 0,
        })
    }

    /// Append a snapshot stamped with the current time
    pub fn log(&mut self, snapshot: &VehicleSnapshot) -> Result<()> {
        self.log_at(snapshot, Utc::now())
    }

    /// Append a snapshot with an explicit timestamp
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or written.
    pub fn log_at(&mut self, snapshot: &VehicleSnapshot, timestamp: DateTime<Utc>) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate(timestamp)?;
        }

        let record = TelemetryRecord {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            snapshot,
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| ShiftClusterError::Telemetry(format!("Failed to serialize record: {}", e)))?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Path of the file currently being written
    pub fn current_file(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:05}.{}",
            FILE_PREFIX,
            timestamp.format("%Y%m%d_%H%M%S"),
            self.files_opened,
            FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Opened telemetry file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.files_opened += 1;

        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in &files[..excess] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed old telemetry file {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry on close: {}", e);
        }
    }
}

fn is_log_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(FILE_PREFIX));
    let extension_matches = path.extension().is_some_and(|ext| ext == FILE_EXTENSION);
    name_matches && extension_matches
}
