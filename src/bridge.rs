//! # Shared State Bridge
//!
//! The only state shared between the acquisition, control and transmit tasks.
//!
//! - The vehicle snapshot lives in an [`ArcSwap`]: readers get a complete,
//!   previously published value without taking a lock, and writers replace
//!   it whole (read-copy-update when only some fields change).
//! - The outbound actuator command is a single slot behind a short
//!   [`parking_lot::Mutex`]. A newer command overwrites one that has not been
//!   taken yet, like the one-outstanding-command serial link it feeds.
//!
//! No lock is held across I/O.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::shifter::controller::ActuatorCommand;
use crate::wire::protocol::{TelemetryFrame, VehicleSnapshot};

/// Snapshot and command exchange between tasks
///
/// # Examples
///
/// ```
/// use shift_cluster::bridge::SharedState;
/// use shift_cluster::shifter::controller::ActuatorCommand;
///
/// let state = SharedState::new();
/// state.publish_command(ActuatorCommand::Angle(135));
/// state.publish_command(ActuatorCommand::Angle(45));
///
/// // Last one wins
/// assert_eq!(state.take_command(), ActuatorCommand::Angle(45));
/// assert_eq!(state.take_command(), ActuatorCommand::None);
/// ```
#[derive(Debug)]
pub struct SharedState {
    snapshot: ArcSwap<VehicleSnapshot>,
    command: Mutex<ActuatorCommand>,
    command_ready: Notify,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(VehicleSnapshot::default()),
            command: Mutex::new(ActuatorCommand::None),
            command_ready: Notify::new(),
        }
    }

    /// Convenience constructor for sharing across tasks
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Replace the whole snapshot
    pub fn publish(&self, snapshot: VehicleSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Replace the wire fields, keeping clutch state and gear goal
    pub fn publish_frame(&self, frame: TelemetryFrame) {
        self.snapshot.rcu(|old| old.with_frame(frame));
    }

    /// Record the clutch sensor state
    pub fn set_clutch_pressed(&self, pressed: bool) {
        self.snapshot.rcu(|old| VehicleSnapshot {
            clutch_pressed: pressed,
            ..**old
        });
    }

    /// Record the controller's gear goal for display
    pub fn set_gear_goal(&self, gear_goal: i32) {
        if self.snapshot.load().gear_goal == gear_goal {
            return;
        }
        self.snapshot.rcu(|old| VehicleSnapshot {
            gear_goal,
            ..**old
        });
    }

    /// Latest published snapshot
    pub fn current_snapshot(&self) -> VehicleSnapshot {
        **self.snapshot.load()
    }

    /// Queue a command for the link, overwriting any command not yet taken
    ///
    /// `ActuatorCommand::None` means "no change" and leaves the slot alone.
    pub fn publish_command(&self, command: ActuatorCommand) {
        if command == ActuatorCommand::None {
            return;
        }
        *self.command.lock() = command;
        self.command_ready.notify_one();
    }

    /// Take the pending command, leaving `ActuatorCommand::None` behind
    pub fn take_command(&self) -> ActuatorCommand {
        std::mem::replace(&mut *self.command.lock(), ActuatorCommand::None)
    }

    /// Wait until a command has been published
    ///
    /// A publish that happens while nobody is waiting is remembered, so the
    /// next call returns immediately.
    pub async fn command_published(&self) {
        self.command_ready.notified().await;
    }
}
