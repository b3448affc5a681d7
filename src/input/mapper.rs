//! # Key Mapper
//!
//! Converts raw evdev key events into [`InputSignal`]s.
//!
//! | Key | Signal |
//! |-----|--------|
//! | `A`, `Left` | Shift down |
//! | `D`, `Right` | Shift up |
//! | `Space` (held) | Clutch pressed |
//!
//! Shifts fire on the initial press only. Auto-repeat events (value 2) are
//! ignored so that holding a key never queues more than one shift.

use evdev::{InputEvent, InputEventKind, Key};

use super::InputSignal;
use crate::shifter::controller::ShiftIntent;

/// evdev key value for a release
const KEY_RELEASED: i32 = 0;
/// evdev key value for a press
const KEY_PRESSED: i32 = 1;

/// Stateful mapper from key events to input signals
#[derive(Debug, Default)]
pub struct IntentMapper {
    clutch_held: bool,
}

impl IntentMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the clutch key is currently held
    pub fn clutch_held(&self) -> bool {
        self.clutch_held
    }

    /// Process one event, returning the signal it produces, if any
    ///
    /// Non-key events and keys without a binding yield `None`. A clutch
    /// signal is only produced when the held state actually changes.
    pub fn process_event(&mut self, event: &InputEvent) -> Option<InputSignal> {
        match event.kind() {
            InputEventKind::Key(key) => self.process_key_event(key, event.value()),
            _ => None,
        }
    }

    fn process_key_event(&mut self, key: Key, value: i32) -> Option<InputSignal> {
        match key {
            Key::KEY_A | Key::KEY_LEFT if value == KEY_PRESSED => {
                Some(InputSignal::Shift(ShiftIntent::Down))
            }
            Key::KEY_D | Key::KEY_RIGHT if value == KEY_PRESSED => {
                Some(InputSignal::Shift(ShiftIntent::Up))
            }
            Key::KEY_SPACE => {
                let held = match value {
                    KEY_PRESSED => true,
                    KEY_RELEASED => false,
                    _ => return None,
                };
                if held == self.clutch_held {
                    return None;
                }
                self.clutch_held = held;
                Some(InputSignal::Clutch(held))
            }
            _ => None,
        }
    }
}
