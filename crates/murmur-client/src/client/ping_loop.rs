use std::sync::Arc;
use std::time::Duration;

use murmur_proto::ProtoMessage;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::Inner;

const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Sends a ping every `ping_interval`, starting immediately, until the
/// connection ends. A failed write closes the transport so the dispatch loop
/// tears down.
pub(crate) async fn run(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.ping_interval.max(MIN_PING_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = inner.end.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let ping = inner.ping.next_ping();
        trace!(target: "murmur::ping", timestamp = ?ping.timestamp, "ping sent");
        if let Err(err) = inner.transport.write_frame(ping.to_frame()).await {
            debug!(target: "murmur::ping", error = %err, "ping write failed");
            if let Err(err) = inner.transport.close().await {
                debug!(target: "murmur::ping", error = %err, "close after ping failure");
            }
            break;
        }
    }
    trace!(target: "murmur::ping", "ping loop stopped");
}
