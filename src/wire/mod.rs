//! # Wire Protocol Module
//!
//! ASCII line protocol spoken by the vehicle microcontroller.
//!
//! This module handles:
//! - Delimiting the byte stream into frames on `\n`
//! - All-or-nothing decoding of the seven tagged telemetry fields
//! - Formatting outbound `G:<angle>` servo commands

pub mod protocol;
pub mod encoder;
pub mod decoder;
