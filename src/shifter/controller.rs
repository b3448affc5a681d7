//! # Shift Controller
//!
//! Turns discrete shift intents into timed servo commands.
//!
//! The controller owns five pieces of state: the gear goal, the time of the
//! last shift, whether the servo has been released, the cooldown gate and the
//! direction of the last shift. Every tick derives the servo command from
//! `(gear_goal, current_gear, now - last_shift_time, servo_detached)`:
//!
//! | Condition | Phase | Command |
//! |-----------|-------|---------|
//! | goal != current | Shifting | `Angle(shift_angle(current, goal))` |
//! | goal == current, within cooldown | Settled-Holding | `Angle(holding_angle)` |
//! | goal == current, cooldown over, still attached | Settled-Detached | `Detach` (once) |
//! | goal == current, already detached | Settled-Detached | `None` |
//!
//! A tick never depends on what the previous tick sent, so a command lost on
//! the link is simply produced again on the next tick.
//!
//! ## Usage
//!
//! ```
//! use std::time::{Duration, Instant};
//! use shift_cluster::shifter::angles::ShiftAngleTable;
//! use shift_cluster::shifter::controller::{
//!     ActuatorCommand, ClutchInterlock, ShiftController, ShiftIntent, ShiftSettings,
//! };
//!
//! let t0 = Instant::now();
//! let settings = ShiftSettings::new(Duration::from_millis(1000), 6, ClutchInterlock::Absent);
//! let mut controller = ShiftController::new(ShiftAngleTable::default(), settings, t0);
//!
//! assert_eq!(controller.request_shift(ShiftIntent::Up, false, t0), Ok(1));
//! assert_eq!(controller.tick(0, t0), ActuatorCommand::Angle(150)); // N -> 1 throw
//! ```

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

use super::angles::ShiftAngleTable;
use crate::wire::protocol::{GEAR_MAX, GEAR_N, GEAR_NONE};

/// Requested shift direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftIntent {
    Up,
    Down,
}

/// What the servo should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Leave the servo alone
    None,
    /// Drive to an angle in degrees
    Angle(i32),
    /// Release holding torque
    Detach,
}

/// Why a shift request was ignored
///
/// Rejections are normal operation (a button mashed during cooldown, an
/// upshift past top gear) and never stop the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidIntent {
    #[error("previous shift still cooling down")]
    Cooldown,

    #[error("clutch not pressed")]
    ClutchNotPressed,

    #[error("already in top gear")]
    AboveTopGear,

    #[error("already in neutral")]
    BelowNeutral,
}

/// Whether a shift needs the clutch pulled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClutchInterlock {
    /// Shift requests are rejected unless the clutch is pressed
    Required,
    /// No clutch sensor; every request passes this check
    #[default]
    Absent,
}

impl From<bool> for ClutchInterlock {
    fn from(required: bool) -> Self {
        if required {
            Self::Required
        } else {
            Self::Absent
        }
    }
}

/// Timing and bounds for one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSettings {
    pub cooldown: Duration,
    pub gear_max: i32,
    pub interlock: ClutchInterlock,
}

impl ShiftSettings {
    /// `gear_max` is clamped to `[1, GEAR_MAX]`
    #[must_use]
    pub fn new(cooldown: Duration, gear_max: i32, interlock: ClutchInterlock) -> Self {
        Self {
            cooldown,
            gear_max: gear_max.clamp(1, GEAR_MAX),
            interlock,
        }
    }
}

impl Default for ShiftSettings {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), GEAR_MAX, ClutchInterlock::Absent)
    }
}

/// Shift actuator state machine
///
/// Created once at startup and owned by the control loop for the life of the
/// process.
#[derive(Debug)]
pub struct ShiftController {
    table: ShiftAngleTable,
    settings: ShiftSettings,

    gear_goal: i32,
    last_shift_time: Instant,
    servo_detached: bool,
    can_shift: bool,
    last_shift_direction: Option<ShiftIntent>,
}

impl ShiftController {
    /// Creates a controller aiming for neutral
    ///
    /// `now` seeds the shift timer, so the first cooldown period after start
    /// holds the servo at neutral before releasing it.
    #[must_use]
    pub fn new(table: ShiftAngleTable, settings: ShiftSettings, now: Instant) -> Self {
        Self {
            table,
            settings,
            gear_goal: GEAR_N,
            last_shift_time: now,
            servo_detached: false,
            can_shift: true,
            last_shift_direction: None,
        }
    }

    /// Accepts or rejects a one-gear shift request
    ///
    /// # Arguments
    ///
    /// * `intent` - Up or down by exactly one gear
    /// * `clutch_pressed` - Latest clutch sensor reading
    /// * `now` - Current time
    ///
    /// # Returns
    ///
    /// * `Ok(goal)` - The new gear goal
    /// * `Err(InvalidIntent)` - Request ignored, no state changed
    pub fn request_shift(
        &mut self,
        intent: ShiftIntent,
        clutch_pressed: bool,
        now: Instant,
    ) -> Result<i32, InvalidIntent> {
        if !self.can_shift {
            return Err(InvalidIntent::Cooldown);
        }

        if self.settings.interlock == ClutchInterlock::Required && !clutch_pressed {
            return Err(InvalidIntent::ClutchNotPressed);
        }

        let goal = match intent {
            ShiftIntent::Up => self.gear_goal + 1,
            ShiftIntent::Down => self.gear_goal - 1,
        };

        if goal > self.settings.gear_max {
            return Err(InvalidIntent::AboveTopGear);
        }
        if goal < GEAR_N {
            return Err(InvalidIntent::BelowNeutral);
        }

        debug!("Shift {:?} accepted: goal {} -> {}", intent, self.gear_goal, goal);

        self.gear_goal = goal;
        self.last_shift_time = now;
        self.servo_detached = false;
        self.can_shift = false;
        self.last_shift_direction = Some(intent);

        Ok(goal)
    }

    /// Runs one control tick
    ///
    /// Re-opens the cooldown gate when due and returns the servo command for
    /// this tick.
    ///
    /// # Arguments
    ///
    /// * `current_gear` - Gear last reported by the gearbox (`-1` if unknown)
    /// * `now` - Current time
    pub fn tick(&mut self, current_gear: i32, now: Instant) -> ActuatorCommand {
        let elapsed = now.saturating_duration_since(self.last_shift_time);
        let cooled_down = elapsed > self.settings.cooldown;

        if !self.can_shift && cooled_down {
            trace!("Shift cooldown elapsed after {:?}", elapsed);
            self.can_shift = true;
        }

        // No confirmed position to shift from
        if current_gear == GEAR_NONE {
            return ActuatorCommand::None;
        }

        if self.gear_goal != current_gear {
            // Moving again after a release (gear popped out, lever kicked by
            // hand): restart the settle window from here.
            if self.servo_detached {
                self.last_shift_time = now;
                self.servo_detached = false;
            }
            return ActuatorCommand::Angle(self.table.shift_angle(current_gear, self.gear_goal));
        }

        if !cooled_down {
            return ActuatorCommand::Angle(self.table.holding_angle(self.last_shift_direction));
        }

        if self.servo_detached {
            return ActuatorCommand::None;
        }

        debug!("Gear {} settled, releasing servo", current_gear);
        self.servo_detached = true;
        ActuatorCommand::Detach
    }

    pub fn gear_goal(&self) -> i32 {
        self.gear_goal
    }

    pub fn can_shift(&self) -> bool {
        self.can_shift
    }

    pub fn servo_detached(&self) -> bool {
        self.servo_detached
    }

    pub fn last_shift_direction(&self) -> Option<ShiftIntent> {
        self.last_shift_direction
    }

    pub fn last_shift_time(&self) -> Instant {
        self.last_shift_time
    }

    pub fn settings(&self) -> &ShiftSettings {
        &self.settings
    }

    pub fn table(&self) -> &ShiftAngleTable {
        &self.table
    }
}
