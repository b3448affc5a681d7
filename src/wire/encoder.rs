//! # Wire Encoder
//!
//! Formats telemetry frames (used by the simulator and tests) and outbound
//! actuator commands.

use super::protocol::*;
use crate::shifter::angles::ActuationRange;
use crate::shifter::controller::ActuatorCommand;

/// Encode a telemetry frame, including the trailing `\n`
///
/// Floats use Rust's shortest round-trip formatting, so
/// `decode_frame(encode_frame(f)) == f` for every finite frame.
///
/// # Examples
///
/// ```
/// use shift_cluster::wire::encoder::encode_frame;
/// use shift_cluster::wire::protocol::TelemetryFrame;
///
/// let frame = TelemetryFrame {
///     current_gear: 2,
///     engine_rpm: 3000,
///     coolant_temp: 75.5,
///     throttle: 20.0,
///     engine_load: 35.0,
///     ambient_temp: 21.0,
///     voltage: 12.8,
/// };
/// assert_eq!(encode_frame(&frame), "G:2,R:3000,T:75.5,Th:20,L:35,A:21,V:12.8\n");
/// ```
pub fn encode_frame(frame: &TelemetryFrame) -> String {
    format!(
        "{TAG_GEAR}{},{TAG_RPM}{},{TAG_COOLANT}{},{TAG_THROTTLE}{},{TAG_LOAD}{},{TAG_AMBIENT}{},{TAG_VOLTAGE}{}\n",
        frame.current_gear,
        frame.engine_rpm,
        frame.coolant_temp,
        frame.throttle,
        frame.engine_load,
        frame.ambient_temp,
        frame.voltage,
    )
}

/// Encode an actuator command for the wire
///
/// # Arguments
///
/// * `command` - Command produced by the shift controller
/// * `range` - Servo actuation range; angles outside it are never sent
/// * `detach_sentinel` - Value the firmware treats as "release the servo",
///   or `None` if `Detach` should not be transmitted at all
///
/// # Returns
///
/// * `Option<String>` - The line to write, or `None` if nothing goes out
pub fn encode_command(
    command: &ActuatorCommand,
    range: &ActuationRange,
    detach_sentinel: Option<i32>,
) -> Option<String> {
    match *command {
        ActuatorCommand::None => None,
        ActuatorCommand::Angle(angle) if range.contains(angle) => {
            Some(format!("{TAG_COMMAND}{}\n", angle))
        }
        ActuatorCommand::Angle(_) => None,
        ActuatorCommand::Detach => {
            detach_sentinel.map(|sentinel| format!("{TAG_COMMAND}{}\n", sentinel))
        }
    }
}
