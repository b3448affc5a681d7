//! # Keyboard Input Source
//!
//! Opens a keyboard through the Linux evdev interface and forwards mapped
//! [`InputSignal`]s to the control task.
//!
//! ## Device Detection
//!
//! With no configured path, `/dev/input/event*` devices are scanned in name
//! order and the first one reporting the shift keys (`A`, `D`) and the
//! clutch key (`Space`) is used.

use std::path::Path;
use std::thread::JoinHandle;

use evdev::{Device, Key};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::mapper::IntentMapper;
use super::InputSignal;
use crate::error::{Result, ShiftClusterError};

/// Keys a device must report to be used for shifting
const REQUIRED_KEYS: [Key; 3] = [Key::KEY_A, Key::KEY_D, Key::KEY_SPACE];

/// Directory scanned for input devices
const INPUT_DIR: &str = "/dev/input";

/// Keyboard handle
pub struct KeyboardSource {
    device: Device,
    device_path: String,
}

impl KeyboardSource {
    /// Open the configured device, or detect one if `device_path` is empty
    ///
    /// # Errors
    ///
    /// - `InputNotFound`: No device with the shift keys was found
    /// - `Input`: The configured device could not be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shift_cluster::input::keyboard::KeyboardSource;
    ///
    /// let keyboard = KeyboardSource::open("")?;
    /// println!("Reading shifts from: {}", keyboard.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_path: &str) -> Result<Self> {
        if device_path.is_empty() {
            return Self::detect();
        }

        let device = Device::open(device_path)
            .map_err(|e| ShiftClusterError::Input(format!("Failed to open {}: {}", device_path, e)))?;
        info!("Opened shift input at: {}", device_path);

        Ok(Self {
            device,
            device_path: device_path.to_string(),
        })
    }

    fn detect() -> Result<Self> {
        let input_dir = Path::new(INPUT_DIR);

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| ShiftClusterError::Input(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("event"))
            })
            .collect();
        entries.sort();

        for path in entries {
            match Device::open(&path) {
                Ok(device) => {
                    debug!("Found input device: {} ({:?})", path.display(), device.name());
                    if has_shift_keys(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Using keyboard at: {}", device_path);
                        return Ok(Self { device, device_path });
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(ShiftClusterError::InputNotFound)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Read events on a dedicated thread and forward mapped signals
    ///
    /// evdev reads block, so they run outside the async runtime. The thread
    /// ends when the device fails or the receiving side is dropped.
    pub fn spawn(mut self, signals: mpsc::Sender<InputSignal>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("shift-input".to_string())
            .spawn(move || {
                let mut mapper = IntentMapper::new();
                loop {
                    let events = match self.device.fetch_events() {
                        Ok(events) => events,
                        Err(e) => {
                            warn!("Shift input {} failed: {}", self.device_path, e);
                            return;
                        }
                    };

                    for event in events {
                        let Some(signal) = mapper.process_event(&event) else {
                            continue;
                        };
                        debug!("Input signal: {:?}", signal);
                        if signals.blocking_send(signal).is_err() {
                            debug!("Input receiver dropped, stopping keyboard reader");
                            return;
                        }
                    }
                }
            })
    }
}

fn has_shift_keys(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| REQUIRED_KEYS.iter().all(|&key| keys.contains(key)))
}
