//! Recorder task: periodic snapshot logging
//!
//! The async side only samples the snapshot. File I/O (writes, rotation,
//! pruning) happens on a dedicated thread fed through a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::shutdown::ShutdownSignal;
use crate::bridge::SharedState;
use crate::telemetry::logger::TelemetryLogger;
use crate::wire::protocol::VehicleSnapshot;

/// Samples buffered between the sampler and the writer thread
const RECORD_QUEUE_CAPACITY: usize = 64;

/// Append the current snapshot to `logger` every `period` until shutdown
///
/// Write errors are logged and recording carries on with the next sample.
/// Samples that arrive while the writer is backed up are dropped.
/// Returns the number of records written.
pub async fn run_recorder(
    logger: TelemetryLogger,
    period: Duration,
    state: Arc<SharedState>,
    mut shutdown: ShutdownSignal,
) -> u64 {
    let (samples, queue) = mpsc::channel(RECORD_QUEUE_CAPACITY);
    let (done, writer) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("telemetry-writer".into())
        .spawn(move || {
            let _ = done.send(write_records(logger, queue));
        });
    if let Err(e) = spawned {
        warn!("Cannot start telemetry writer, recording disabled: {}", e);
        return 0;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut dropped: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => break,

            _ = ticker.tick() => {
                match samples.try_send(state.current_snapshot()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!("Telemetry writer stopped, recording disabled");
                        break;
                    }
                }
            }
        }
    }

    // Closing the channel lets the writer drain and flush
    drop(samples);
    let written = match writer.await {
        Ok(written) => written,
        Err(_) => {
            warn!("Telemetry writer exited without reporting");
            0
        }
    };
    debug!("Recorder stopped after {} records ({} dropped)", written, dropped);
    written
}

fn write_records(mut logger: TelemetryLogger, mut queue: mpsc::Receiver<VehicleSnapshot>) -> u64 {
    let mut written: u64 = 0;
    while let Some(snapshot) = queue.blocking_recv() {
        match logger.log(&snapshot) {
            Ok(()) => written += 1,
            Err(e) => warn!("Telemetry record dropped: {}", e),
        }
    }

    if let Err(e) = logger.flush() {
        warn!("Failed to flush telemetry: {}", e);
    }
    written
}
