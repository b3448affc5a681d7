//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ShiftClusterError};
use crate::shifter::angles::{ActuationRange, AngleOverride, ShiftAngleTable};
use crate::shifter::controller::{ClutchInterlock, ShiftSettings};
use crate::wire::protocol::{GEAR_MAX, GEAR_N};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub shifter: ShifterConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path, or "auto" to search `by_id_dir`
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_by_id_dir")]
    pub by_id_dir: String,

    #[serde(default = "default_match_patterns")]
    pub match_patterns: Vec<String>,
}

/// Shift actuator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ShifterConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    #[serde(default = "default_gear_max")]
    pub gear_max: i32,

    #[serde(default = "default_neutral_angle")]
    pub neutral_angle: i32,

    #[serde(default = "default_up_angle")]
    pub up_angle: i32,

    #[serde(default = "default_down_angle")]
    pub down_angle: i32,

    #[serde(default = "default_backlash_deg")]
    pub backlash_deg: i32,

    #[serde(default = "default_angle_min")]
    pub angle_min: i32,

    #[serde(default = "default_angle_max")]
    pub angle_max: i32,

    #[serde(default)]
    pub clutch_interlock: bool,

    #[serde(default = "default_transmit_detach")]
    pub transmit_detach: bool,

    #[serde(default = "default_detach_sentinel")]
    pub detach_sentinel: i32,

    #[serde(default = "default_overrides")]
    pub overrides: Vec<AngleOverride>,
}

/// Shift input configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub enabled: bool,

    /// evdev device path; empty means auto-detect a keyboard
    #[serde(default)]
    pub device_path: String,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_serial_port() -> String { "auto".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_by_id_dir() -> String { "/dev/serial/by-id".to_string() }
fn default_match_patterns() -> Vec<String> { vec!["Arduino".to_string(), "usbserial".to_string()] }

fn default_cooldown_ms() -> u64 { 1000 }
fn default_tick_hz() -> u32 { 50 }
fn default_gear_max() -> i32 { 6 }
fn default_neutral_angle() -> i32 { 90 }
fn default_up_angle() -> i32 { 135 }
fn default_down_angle() -> i32 { 45 }
fn default_backlash_deg() -> i32 { 5 }
fn default_angle_min() -> i32 { 0 }
fn default_angle_max() -> i32 { 180 }
fn default_transmit_detach() -> bool { true }
fn default_detach_sentinel() -> i32 { -1 }
fn default_overrides() -> Vec<AngleOverride> {
    vec![
        AngleOverride { from: 0, to: 1, angle: 150 },
        AngleOverride { from: 1, to: 0, angle: 60 },
    ]
}

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

const VALID_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            by_id_dir: default_by_id_dir(),
            match_patterns: default_match_patterns(),
        }
    }
}

impl Default for ShifterConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            tick_hz: default_tick_hz(),
            gear_max: default_gear_max(),
            neutral_angle: default_neutral_angle(),
            up_angle: default_up_angle(),
            down_angle: default_down_angle(),
            backlash_deg: default_backlash_deg(),
            angle_min: default_angle_min(),
            angle_max: default_angle_max(),
            clutch_interlock: false,
            transmit_detach: default_transmit_detach(),
            detach_sentinel: default_detach_sentinel(),
            overrides: default_overrides(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl ShifterConfig {
    /// Angle table built from the configured angles and overrides
    pub fn angle_table(&self) -> ShiftAngleTable {
        ShiftAngleTable::new(self.neutral_angle, self.up_angle, self.down_angle, self.backlash_deg)
            .with_overrides(self.overrides.iter().copied())
    }

    /// Cooldown, top gear and interlock policy for the controller
    pub fn settings(&self) -> ShiftSettings {
        ShiftSettings::new(
            self.cooldown(),
            self.gear_max,
            ClutchInterlock::from(self.clutch_interlock),
        )
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn actuation_range(&self) -> ActuationRange {
        ActuationRange::new(self.angle_min, self.angle_max)
    }

    /// Control loop period
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_hz.max(1)))
    }

    /// Value sent for `Detach`, or `None` if detach is not transmitted
    pub fn detach_sentinel(&self) -> Option<i32> {
        self.transmit_detach.then_some(self.detach_sentinel)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shift_cluster::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Serial
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.port == crate::serial::AUTO_PORT {
            if self.serial.by_id_dir.is_empty() {
                return Err(invalid("by_id_dir cannot be empty when port is \"auto\""));
            }
            if self.serial.match_patterns.iter().all(|p| p.is_empty()) {
                return Err(invalid("match_patterns must contain a non-empty pattern when port is \"auto\""));
            }
        }

        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400",
            ));
        }

        // Shifter timing
        let shifter = &self.shifter;

        if shifter.cooldown_ms == 0 || shifter.cooldown_ms > 10000 {
            return Err(invalid("cooldown_ms must be between 1 and 10000"));
        }

        if shifter.tick_hz == 0 || shifter.tick_hz > 1000 {
            return Err(invalid("tick_hz must be between 1 and 1000"));
        }

        if shifter.tick_period() >= shifter.cooldown() {
            return Err(invalid("tick period must be shorter than cooldown_ms"));
        }

        if shifter.gear_max < 1 || shifter.gear_max > GEAR_MAX {
            return Err(invalid(format!("gear_max must be between 1 and {}", GEAR_MAX)));
        }

        // Shifter angles
        if shifter.angle_min >= shifter.angle_max {
            return Err(invalid("angle_min must be less than angle_max"));
        }

        if shifter.backlash_deg < 0 || shifter.backlash_deg > 30 {
            return Err(invalid("backlash_deg must be between 0 and 30"));
        }

        for rule in &shifter.overrides {
            let in_range = |gear: i32| (GEAR_N..=shifter.gear_max).contains(&gear);
            if !in_range(rule.from) || !in_range(rule.to) {
                return Err(invalid(format!(
                    "override {} -> {} uses a gear outside 0..={}",
                    rule.from, rule.to, shifter.gear_max
                )));
            }
            if rule.from == rule.to {
                return Err(invalid(format!("override {} -> {} does not change gear", rule.from, rule.to)));
            }
        }

        let range = shifter.actuation_range();
        for angle in shifter.angle_table().emitted_angles() {
            if !range.contains(angle) {
                return Err(invalid(format!(
                    "angle {} is outside the actuation range {}..={}",
                    angle, shifter.angle_min, shifter.angle_max
                )));
            }
        }

        if shifter.transmit_detach && range.contains(shifter.detach_sentinel) {
            return Err(invalid("detach_sentinel must lie outside the actuation range"));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> ShiftClusterError {
    ShiftClusterError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"

[shifter]
cooldown_ms = 800
clutch_interlock = true

[[shifter.overrides]]
from = 0
to = 1
angle = 160

[input]
enabled = true

[telemetry]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.shifter.cooldown_ms, 800);
        assert!(config.shifter.clutch_interlock);
        assert_eq!(config.shifter.overrides, vec![AngleOverride { from: 0, to: 1, angle: 160 }]);
        assert!(config.input.enabled);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_shipped_default_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.serial.port, "auto");
        assert_eq!(config.shifter.angle_table(), ShifterConfig::default().angle_table());
        assert_eq!(config.shifter.detach_sentinel(), Some(-1));
        assert!(!config.input.enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.serial.port, "auto");
        assert_eq!(config.shifter.gear_max, 6);
        assert_eq!(config.shifter.overrides, default_overrides());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/shift-cluster.toml");
        assert!(matches!(result, Err(ShiftClusterError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[shifter\ncooldown_ms = ");
        assert!(matches!(result, Err(ShiftClusterError::Config(_))));
    }

    #[test]
    fn test_shifter_conversions() {
        let shifter = ShifterConfig::default();
        let table = shifter.angle_table();
        assert_eq!(table.shift_angle(0, 1), 150);
        assert_eq!(table.shift_angle(3, 4), 135);

        let settings = shifter.settings();
        assert_eq!(settings.cooldown, Duration::from_millis(1000));
        assert_eq!(settings.gear_max, 6);
        assert_eq!(settings.interlock, ClutchInterlock::Absent);

        assert_eq!(shifter.tick_period(), Duration::from_millis(20));
        assert_eq!(shifter.detach_sentinel(), Some(-1));
        assert_eq!(shifter.actuation_range(), ActuationRange::new(0, 180));
    }

    #[test]
    fn test_detach_not_transmitted() {
        let mut config = Config::default();
        config.shifter.transmit_detach = false;
        config.shifter.detach_sentinel = 90; // ignored when not transmitted
        assert!(config.validate().is_ok());
        assert_eq!(config.shifter.detach_sentinel(), None);
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auto_port_needs_patterns() {
        let mut config = Config::default();
        config.serial.match_patterns = vec![String::new()];
        assert!(config.validate().is_err());

        config.serial.port = "/dev/ttyACM0".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &VALID_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_cooldown_bounds() {
        let mut config = Config::default();
        config.shifter.cooldown_ms = 0;
        assert!(config.validate().is_err());
        config.shifter.cooldown_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_must_be_faster_than_cooldown() {
        let mut config = Config::default();
        config.shifter.cooldown_ms = 50;
        config.shifter.tick_hz = 10; // 100 ms period
        assert!(config.validate().is_err());

        config.shifter.tick_hz = 100; // 10 ms period
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_hz_bounds() {
        let mut config = Config::default();
        config.shifter.tick_hz = 0;
        assert!(config.validate().is_err());
        config.shifter.tick_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gear_max_bounds() {
        let mut config = Config::default();
        config.shifter.gear_max = 0;
        assert!(config.validate().is_err());
        config.shifter.gear_max = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_angle_outside_range() {
        let mut config = Config::default();
        config.shifter.up_angle = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_holding_angle_outside_range() {
        let mut config = Config::default();
        config.shifter.neutral_angle = 178;
        config.shifter.up_angle = 180;
        config.shifter.overrides.clear();
        // 178 + 5 backlash = 183
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_override_angle_outside_range() {
        let mut config = Config::default();
        config.shifter.overrides.push(AngleOverride { from: 2, to: 3, angle: 190 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_override_gear_outside_range() {
        let mut config = Config::default();
        config.shifter.gear_max = 4;
        config.shifter.overrides.push(AngleOverride { from: 4, to: 5, angle: 140 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_override_same_gear() {
        let mut config = Config::default();
        config.shifter.overrides.push(AngleOverride { from: 2, to: 2, angle: 140 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_angle_min_not_below_max() {
        let mut config = Config::default();
        config.shifter.angle_min = 180;
        config.shifter.angle_max = 180;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backlash_bounds() {
        let mut config = Config::default();
        config.shifter.backlash_deg = -1;
        assert!(config.validate().is_err());
        config.shifter.backlash_deg = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_detach_sentinel_inside_range() {
        let mut config = Config::default();
        config.shifter.detach_sentinel = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_interval_bounds() {
        let mut config = Config::default();
        config.telemetry.log_interval_ms = 0;
        assert!(config.validate().is_err());
        config.telemetry.log_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "auto");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_by_id_dir(), "/dev/serial/by-id");
        assert_eq!(default_match_patterns(), vec!["Arduino", "usbserial"]);
        assert_eq!(default_cooldown_ms(), 1000);
        assert_eq!(default_tick_hz(), 50);
        assert_eq!(default_gear_max(), 6);
        assert_eq!(default_neutral_angle(), 90);
        assert_eq!(default_up_angle(), 135);
        assert_eq!(default_down_angle(), 45);
        assert_eq!(default_backlash_deg(), 5);
        assert_eq!(default_angle_min(), 0);
        assert_eq!(default_angle_max(), 180);
        assert!(default_transmit_detach());
        assert_eq!(default_detach_sentinel(), -1);
        assert!(default_telemetry_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_interval_ms(), 100);
        assert_eq!(default_log_format(), "jsonl");
    }
}
