//! # Telemetry Module
//!
//! Records vehicle snapshots to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting snapshots as JSONL (JSON Lines) with UTC timestamps
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

pub mod logger;
