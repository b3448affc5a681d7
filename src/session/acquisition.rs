//! Acquisition task: link bytes in, snapshots out
//!
//! Reads the link one byte at a time, reassembles frames and publishes every
//! valid one. Malformed frames are counted and dropped; the previous
//! snapshot stays in place.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use crate::bridge::SharedState;
use crate::error::LinkError;
use crate::serial::port_trait::ByteSource;
use crate::wire::decoder::{FrameDecoder, FrameStats};

/// Number of decoded frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 500;

/// Run until shutdown or until the link fails
///
/// # Returns
///
/// * `Ok(FrameStats)` - Stopped by shutdown
/// * `Err(LinkError)` - The link closed or failed to read
pub async fn run_acquisition<S: ByteSource>(
    mut source: S,
    state: Arc<SharedState>,
    mut shutdown: ShutdownSignal,
) -> Result<FrameStats, LinkError> {
    let mut decoder = FrameDecoder::new();
    let mut last_log_count: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                let stats = decoder.stats();
                info!("Acquisition stopped: {} frames decoded, {} discarded", stats.decoded, stats.discarded);
                return Ok(stats);
            }

            byte = source.read_byte() => {
                let byte = match byte {
                    Ok(byte) => byte,
                    Err(e) => {
                        warn!("Vehicle link lost: {}", e);
                        return Err(e);
                    }
                };

                match decoder.push(byte) {
                    Some(Ok(frame)) => state.publish_frame(frame),
                    Some(Err(e)) => debug!("Discarded frame: {}", e),
                    None => continue,
                }

                let stats = decoder.stats();
                if stats.decoded - last_log_count >= LOG_INTERVAL_FRAMES {
                    info!("Decoded {} frames ({} discarded)", stats.decoded, stats.discarded);
                    last_log_count = stats.decoded;
                }
            }
        }
    }
}
