//! # Shift Cluster Library
//!
//! Vehicle telemetry decoding and sequential gearbox shift actuation over a
//! serial link to a microcontroller.
//!
//! The microcontroller streams one text frame per line with the engaged gear
//! and engine readings. This library decodes those frames into a shared
//! vehicle snapshot, turns driver shift requests into timed servo angles and
//! writes them back over the same link.

pub mod bridge;
pub mod config;
pub mod error;
pub mod input;
pub mod serial;
pub mod session;
pub mod shifter;
pub mod telemetry;
pub mod wire;
