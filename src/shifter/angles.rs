//! # Shift Angle Table
//!
//! Maps a gear transition to one of a handful of fixed servo angles.
//!
//! Override rules are checked first, in order, so gearbox quirks (first gear
//! engaging with a longer throw than the other gears, for example) are data
//! rather than control flow. Everything else falls back to the generic rule:
//!
//! | Transition | Angle |
//! |------------|-------|
//! | `to > from` | generic up angle |
//! | `to < from` | generic down angle |
//! | `to == from` | neutral angle |
//!
//! ## Usage
//!
//! ```
//! use shift_cluster::shifter::angles::ShiftAngleTable;
//!
//! let table = ShiftAngleTable::new(90, 135, 45, 5).with_override(0, 1, 150);
//!
//! assert_eq!(table.shift_angle(0, 1), 150); // override
//! assert_eq!(table.shift_angle(2, 3), 135); // generic up
//! assert_eq!(table.shift_angle(3, 2), 45);  // generic down
//! ```

use serde::Deserialize;

use super::controller::ShiftIntent;

/// Inclusive servo angle range in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationRange {
    min: i32,
    max: i32,
}

impl ActuationRange {
    /// Creates a range; `min` and `max` are swapped if given in reverse
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn contains(&self, angle: i32) -> bool {
        (self.min..=self.max).contains(&angle)
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }
}

impl Default for ActuationRange {
    fn default() -> Self {
        Self::new(0, 180)
    }
}

/// One `(from, to) -> angle` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AngleOverride {
    pub from: i32,
    pub to: i32,
    pub angle: i32,
}

/// Servo angles for one gearbox profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftAngleTable {
    neutral: i32,
    up: i32,
    down: i32,
    backlash: i32,
    overrides: Vec<AngleOverride>,
}

impl Default for ShiftAngleTable {
    /// Sequential six-speed profile: first gear needs a longer throw going in
    /// and only a half throw to find neutral coming out.
    fn default() -> Self {
        Self::new(90, 135, 45, 5)
            .with_override(0, 1, 150)
            .with_override(1, 0, 60)
    }
}

impl ShiftAngleTable {
    /// Creates a table with no overrides
    ///
    /// # Arguments
    ///
    /// * `neutral` - Resting angle with no load on the shift drum
    /// * `up` - Generic upshift throw
    /// * `down` - Generic downshift throw
    /// * `backlash` - Holding offset applied after a shift (degrees, >= 0)
    #[must_use]
    pub fn new(neutral: i32, up: i32, down: i32, backlash: i32) -> Self {
        Self {
            neutral,
            up,
            down,
            backlash: backlash.abs(),
            overrides: Vec::new(),
        }
    }

    /// Appends an override rule; earlier rules win
    #[must_use]
    pub fn with_override(mut self, from: i32, to: i32, angle: i32) -> Self {
        self.overrides.push(AngleOverride { from, to, angle });
        self
    }

    /// Replaces all override rules
    #[must_use]
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = AngleOverride>) -> Self {
        self.overrides = overrides.into_iter().collect();
        self
    }

    /// Angle to command while moving from `from` towards `to`
    pub fn shift_angle(&self, from: i32, to: i32) -> i32 {
        if let Some(rule) = self.overrides.iter().find(|r| r.from == from && r.to == to) {
            return rule.angle;
        }

        match to.cmp(&from) {
            std::cmp::Ordering::Greater => self.up,
            std::cmp::Ordering::Less => self.down,
            std::cmp::Ordering::Equal => self.neutral,
        }
    }

    /// Angle to hold once the gear is reached
    ///
    /// Neutral, pushed by the backlash amount towards the side the last shift
    /// came from so the lever doesn't rest in the slack.
    pub fn holding_angle(&self, last_shift: Option<ShiftIntent>) -> i32 {
        let side = match last_shift {
            Some(ShiftIntent::Up) => (self.up - self.neutral).signum(),
            Some(ShiftIntent::Down) => (self.down - self.neutral).signum(),
            None => 0,
        };
        self.neutral + side * self.backlash
    }

    /// Every angle this table can ever produce
    pub fn emitted_angles(&self) -> Vec<i32> {
        let mut angles = vec![
            self.neutral,
            self.up,
            self.down,
            self.holding_angle(Some(ShiftIntent::Up)),
            self.holding_angle(Some(ShiftIntent::Down)),
        ];
        angles.extend(self.overrides.iter().map(|r| r.angle));
        angles
    }

    pub fn neutral(&self) -> i32 {
        self.neutral
    }

    pub fn up(&self) -> i32 {
        self.up
    }

    pub fn down(&self) -> i32 {
        self.down
    }

    pub fn overrides(&self) -> &[AngleOverride] {
        &self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_rules() {
        let table = ShiftAngleTable::new(90, 135, 45, 5);
        assert_eq!(table.shift_angle(2, 3), 135);
        assert_eq!(table.shift_angle(5, 6), 135);
        assert_eq!(table.shift_angle(4, 3), 45);
        assert_eq!(table.shift_angle(3, 3), 90);
    }

    #[test]
    fn test_generic_rule_ignores_step_size() {
        let table = ShiftAngleTable::new(90, 135, 45, 5);
        assert_eq!(table.shift_angle(1, 4), 135);
        assert_eq!(table.shift_angle(6, 2), 45);
    }

    #[test]
    fn test_default_first_gear_overrides() {
        let table = ShiftAngleTable::default();
        assert_eq!(table.shift_angle(0, 1), 150);
        assert_eq!(table.shift_angle(1, 0), 60);
        assert_eq!(table.shift_angle(1, 2), 135);
        assert_eq!(table.shift_angle(2, 1), 45);
    }

    #[test]
    fn test_first_matching_override_wins() {
        let table = ShiftAngleTable::new(90, 135, 45, 5)
            .with_override(2, 3, 120)
            .with_override(2, 3, 170);
        assert_eq!(table.shift_angle(2, 3), 120);
    }

    #[test]
    fn test_with_overrides_replaces_rules() {
        let table = ShiftAngleTable::default().with_overrides(vec![AngleOverride {
            from: 3,
            to: 4,
            angle: 140,
        }]);
        assert_eq!(table.shift_angle(0, 1), 135);
        assert_eq!(table.shift_angle(3, 4), 140);
        assert_eq!(table.overrides().len(), 1);
    }

    #[test]
    fn test_holding_angle_follows_last_shift() {
        let table = ShiftAngleTable::new(90, 135, 45, 5);
        assert_eq!(table.holding_angle(None), 90);
        assert_eq!(table.holding_angle(Some(ShiftIntent::Up)), 95);
        assert_eq!(table.holding_angle(Some(ShiftIntent::Down)), 85);
    }

    #[test]
    fn test_holding_angle_mirrored_servo() {
        // Servo mounted the other way round: upshift throws to a lower angle
        let table = ShiftAngleTable::new(90, 40, 140, 4);
        assert_eq!(table.holding_angle(Some(ShiftIntent::Up)), 86);
        assert_eq!(table.holding_angle(Some(ShiftIntent::Down)), 94);
    }

    #[test]
    fn test_negative_backlash_is_normalized() {
        let table = ShiftAngleTable::new(90, 135, 45, -5);
        assert_eq!(table.holding_angle(Some(ShiftIntent::Up)), 95);
    }

    #[test]
    fn test_emitted_angles() {
        let table = ShiftAngleTable::default();
        let mut angles = table.emitted_angles();
        angles.sort_unstable();
        assert_eq!(angles, vec![45, 60, 85, 90, 95, 135, 150]);
    }

    #[test]
    fn test_actuation_range() {
        let range = ActuationRange::new(180, 0);
        assert_eq!(range.min(), 0);
        assert_eq!(range.max(), 180);
        assert!(range.contains(0));
        assert!(range.contains(180));
        assert!(!range.contains(-1));
        assert!(!range.contains(181));
    }
}
