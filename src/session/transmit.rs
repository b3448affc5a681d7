//! Transmit task: pending actuator command out to the link
//!
//! Sleeps until the control task publishes a command, takes it and writes
//! it as one `G:<angle>\n` line. Commands that cannot be expressed on the
//! wire are skipped. A failed write is logged and dropped; the controller
//! produces the command again on its next tick.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::shutdown::ShutdownSignal;
use crate::bridge::SharedState;
use crate::serial::port_trait::LineSink;
use crate::shifter::angles::ActuationRange;
use crate::wire::encoder::encode_command;

/// Counters reported when the task stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitStats {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Run until shutdown
pub async fn run_transmit<K: LineSink>(
    mut sink: K,
    state: Arc<SharedState>,
    range: ActuationRange,
    detach_sentinel: Option<i32>,
    mut shutdown: ShutdownSignal,
) -> TransmitStats {
    let mut stats = TransmitStats::default();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                info!(
                    "Transmit stopped: {} sent, {} failed, {} skipped",
                    stats.sent, stats.failed, stats.skipped
                );
                return stats;
            }

            _ = state.command_published() => {
                let command = state.take_command();
                let Some(line) = encode_command(&command, &range, detach_sentinel) else {
                    debug!("Not transmitting {:?}", command);
                    stats.skipped += 1;
                    continue;
                };

                match sink.write_line(&line).await {
                    Ok(()) => {
                        trace!("Sent {}", line.trim_end());
                        stats.sent += 1;
                    }
                    Err(e) => {
                        warn!("Failed to send {:?}: {}", command, e);
                        stats.failed += 1;
                    }
                }
            }
        }
    }
}
