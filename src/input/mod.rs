//! # Shift Input Module
//!
//! Turns driver key presses into shift intents and clutch state.
//!
//! This module handles:
//! - Finding and opening a keyboard through evdev
//! - Mapping key events to [`InputSignal`]s
//! - Forwarding signals to the control task over a channel

pub mod keyboard;
pub mod mapper;

use crate::shifter::controller::ShiftIntent;

/// Driver input delivered to the control task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    /// One-gear shift request
    Shift(ShiftIntent),
    /// Clutch pedal pressed (`true`) or released (`false`)
    Clutch(bool),
}
