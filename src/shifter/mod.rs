//! # Shifter Module
//!
//! Sequential gearbox shift actuator control.
//!
//! This module handles:
//! - Accepting one-gear shift intents behind a cooldown and clutch interlock
//! - Choosing servo throw angles per gear transition
//! - Holding with backlash compensation, then releasing the servo

pub mod angles;
pub mod controller;
