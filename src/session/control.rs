//! Control task: fixed-rate shift controller tick
//!
//! Each period the task reads the latest snapshot, runs one controller tick
//! and publishes the resulting command. Driver input arrives between ticks
//! and is applied immediately: shift intents go to the controller, clutch
//! changes go into the snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::shutdown::ShutdownSignal;
use crate::bridge::SharedState;
use crate::input::InputSignal;
use crate::shifter::controller::ShiftController;

/// Run the controller until shutdown
///
/// `input` is optional: without it the controller still holds and releases
/// the servo, it just never receives a shift request.
pub async fn run_control(
    mut controller: ShiftController,
    period: Duration,
    state: Arc<SharedState>,
    mut input: Option<mpsc::Receiver<InputSignal>>,
    mut shutdown: ShutdownSignal,
) -> ShiftController {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Shift controller running every {:?}", period);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                debug!("Control task stopping at gear goal {}", controller.gear_goal());
                return controller;
            }

            signal = next_signal(&mut input) => match signal {
                Some(signal) => apply_signal(&mut controller, &state, signal),
                None => {
                    debug!("Input channel closed");
                    input = None;
                }
            },

            _ = ticker.tick() => {
                let now = Instant::now().into_std();
                let snapshot = state.current_snapshot();
                let command = controller.tick(snapshot.current_gear(), now);
                state.set_gear_goal(controller.gear_goal());
                state.publish_command(command);
            }
        }
    }
}

async fn next_signal(input: &mut Option<mpsc::Receiver<InputSignal>>) -> Option<InputSignal> {
    match input {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn apply_signal(controller: &mut ShiftController, state: &SharedState, signal: InputSignal) {
    match signal {
        InputSignal::Shift(intent) => {
            let clutch_pressed = state.current_snapshot().clutch_pressed;
            match controller.request_shift(intent, clutch_pressed, Instant::now().into_std()) {
                Ok(goal) => {
                    info!("Shift {:?} accepted, gear goal {}", intent, goal);
                    state.set_gear_goal(goal);
                }
                Err(reason) => debug!("Shift {:?} rejected: {}", intent, reason),
            }
        }
        InputSignal::Clutch(pressed) => {
            debug!("Clutch {}", if pressed { "pressed" } else { "released" });
            state.set_clutch_pressed(pressed);
        }
    }
}
