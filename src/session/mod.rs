//! # Session Module
//!
//! Runs the cluster against one open link.
//!
//! This module handles:
//! - Acquisition: link bytes to published snapshots
//! - Control: fixed-rate shift controller ticks and driver input
//! - Transmit: pending actuator command to the link
//! - Recording: periodic telemetry snapshots to disk (optional)
//!
//! The tasks share nothing but [`SharedState`] and a [`Shutdown`] signal.
//! The session ends when shutdown is triggered. If the link fails first,
//! acquisition exits (dropping the reader half) while control keeps running
//! on the last known snapshot. Every task is joined before [`Session::run`]
//! returns, which drops the remaining link half.

pub mod acquisition;
pub mod control;
pub mod recorder;
pub mod shutdown;
pub mod transmit;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

pub use shutdown::{Shutdown, ShutdownSignal};

use crate::bridge::SharedState;
use crate::config::Config;
use crate::error::{Result, ShiftClusterError};
use crate::input::InputSignal;
use crate::serial::port_trait::{ByteSource, LineSink};
use crate::shifter::controller::ShiftController;
use crate::telemetry::logger::TelemetryLogger;

/// One run of the cluster
#[derive(Debug)]
pub struct Session {
    config: Config,
    state: Arc<SharedState>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: SharedState::shared(),
        }
    }

    /// Shared state, for observers such as a dashboard
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Run all tasks until shutdown
    ///
    /// # Arguments
    ///
    /// * `source` - Receiving half of the link
    /// * `sink` - Transmitting half of the link
    /// * `input` - Driver input, if an input device is in use
    /// * `shutdown` - External stop request (e.g. Ctrl+C)
    ///
    /// # Errors
    ///
    /// - `Link`: The link closed or failed before shutdown was requested
    /// - `Io`: The telemetry directory could not be created
    /// - `Task`: A task panicked
    pub async fn run<S, K>(
        self,
        source: S,
        sink: K,
        input: Option<mpsc::Receiver<InputSignal>>,
        shutdown: Shutdown,
    ) -> Result<()>
    where
        S: ByteSource + 'static,
        K: LineSink + 'static,
    {
        let shifter = &self.config.shifter;

        let recorder = if self.config.telemetry.enabled {
            let logger = TelemetryLogger::new(&self.config.telemetry)?;
            Some(tokio::spawn(recorder::run_recorder(
                logger,
                Duration::from_millis(self.config.telemetry.log_interval_ms),
                Arc::clone(&self.state),
                shutdown.subscribe(),
            )))
        } else {
            None
        };

        let controller = ShiftController::new(
            shifter.angle_table(),
            shifter.settings(),
            Instant::now().into_std(),
        );

        let acquisition = tokio::spawn(acquisition::run_acquisition(
            source,
            Arc::clone(&self.state),
            shutdown.subscribe(),
        ));
        let control = tokio::spawn(control::run_control(
            controller,
            shifter.tick_period(),
            Arc::clone(&self.state),
            input,
            shutdown.subscribe(),
        ));
        let transmit = tokio::spawn(transmit::run_transmit(
            sink,
            Arc::clone(&self.state),
            shifter.actuation_range(),
            shifter.detach_sentinel(),
            shutdown.subscribe(),
        ));

        info!("Session started");

        // Acquisition only ends on shutdown, link failure or panic
        let acquired = acquisition.await;
        if let Ok(Err(e)) = &acquired {
            warn!("Acquisition stopped ({}), control continues on the last snapshot", e);
            shutdown.subscribe().wait().await;
        }

        // The remaining tasks must be stopped before any join error propagates
        shutdown.trigger();
        let controlled = control.await;
        let transmitted = transmit.await;
        let recorded = match recorder {
            Some(task) => Some(task.await),
            None => None,
        };

        let link_result = acquired?;
        let controller = controlled?;
        let sent = transmitted?;
        if let Some(recorded) = recorded {
            recorded?;
        }

        info!(
            "Session ended at gear goal {}, {} commands sent",
            controller.gear_goal(),
            sent.sent
        );

        match link_result {
            Ok(stats) => {
                info!("Frames decoded: {}, discarded: {}", stats.decoded, stats.discarded);
                Ok(())
            }
            Err(e) => Err(ShiftClusterError::Link(e)),
        }
    }
}
