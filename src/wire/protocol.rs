//! # Wire Protocol Constants and Types
//!
//! Telemetry frames arrive as newline-terminated ASCII records with seven
//! tagged fields in a fixed order:
//!
//! ```text
//! G:<int>,R:<int>,T:<float>,Th:<float>,L:<float>,A:<float>,V:<float>\n
//! ```
//!
//! Actuator commands go the other way as `G:<angle>\n`.

use serde::Serialize;

/// Frame delimiter
pub const FRAME_DELIMITER: u8 = b'\n';

/// Field separator inside a frame
pub const FIELD_SEPARATOR: char = ',';

/// Longest accepted frame body (bytes before the delimiter)
///
/// A well-formed frame is well under 80 bytes; anything longer is line noise.
pub const MAX_FRAME_LEN: usize = 128;

/// Gear tag
pub const TAG_GEAR: &str = "G:";
/// Engine RPM tag
pub const TAG_RPM: &str = "R:";
/// Coolant temperature tag
pub const TAG_COOLANT: &str = "T:";
/// Throttle tag
pub const TAG_THROTTLE: &str = "Th:";
/// Engine load tag
pub const TAG_LOAD: &str = "L:";
/// Ambient temperature tag
pub const TAG_AMBIENT: &str = "A:";
/// Battery voltage tag
pub const TAG_VOLTAGE: &str = "V:";

/// Field tags in wire order
pub const FIELD_TAGS: [&str; 7] = [
    TAG_GEAR,
    TAG_RPM,
    TAG_COOLANT,
    TAG_THROTTLE,
    TAG_LOAD,
    TAG_AMBIENT,
    TAG_VOLTAGE,
];

/// Command tag for the outbound servo angle
pub const TAG_COMMAND: &str = "G:";

/// Gear unknown / not reported
pub const GEAR_NONE: i32 = -1;
/// Neutral
pub const GEAR_N: i32 = 0;
/// Highest gear any supported gearbox has
pub const GEAR_MAX: i32 = 6;

/// Upper bound of the throttle reading
pub const THROTTLE_MAX: f32 = 100.0;
/// Upper bound of the engine load reading (percent)
pub const ENGINE_LOAD_MAX: f32 = 100.0;

/// The seven fields carried by one telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryFrame {
    /// Engaged gear (-1 unknown, 0 neutral, 1..6)
    pub current_gear: i32,

    /// Engine speed in RPM
    pub engine_rpm: u32,

    /// Coolant temperature in °C
    pub coolant_temp: f32,

    /// Throttle position (0..THROTTLE_MAX)
    pub throttle: f32,

    /// Engine load in percent
    pub engine_load: f32,

    /// Ambient temperature in °C
    pub ambient_temp: f32,

    /// Battery voltage in volts
    pub voltage: f32,
}

impl Default for TelemetryFrame {
    fn default() -> Self {
        Self {
            current_gear: GEAR_NONE,
            engine_rpm: 0,
            coolant_temp: 0.0,
            throttle: 0.0,
            engine_load: 0.0,
            ambient_temp: 0.0,
            voltage: 0.0,
        }
    }
}

/// Latest known vehicle state
///
/// Immutable once published. The wire part is replaced as a whole on every
/// decoded frame; `clutch_pressed` and `gear_goal` are carried over because
/// they come from the clutch sensor and the shift controller, not the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    #[serde(flatten)]
    pub frame: TelemetryFrame,

    /// Clutch lever pulled in
    pub clutch_pressed: bool,

    /// Gear the shift controller is working towards (display only)
    pub gear_goal: i32,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            frame: TelemetryFrame::default(),
            clutch_pressed: false,
            gear_goal: GEAR_N,
        }
    }
}

impl VehicleSnapshot {
    /// Returns a new snapshot with the wire fields replaced by `frame`
    #[must_use]
    pub fn with_frame(&self, frame: TelemetryFrame) -> Self {
        Self { frame, ..*self }
    }

    /// Engaged gear as last reported by the gearbox
    pub fn current_gear(&self) -> i32 {
        self.frame.current_gear
    }
}
