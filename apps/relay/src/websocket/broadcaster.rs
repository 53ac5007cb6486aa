//! Central broadcast loop
//!
//! One task drains the broadcast channel and fans each event out to every
//! registered connection. Delivery failures only prune the failing peer; the
//! loop itself stops only when every producer is gone.

use std::time::Duration;

use tokio::sync::mpsc;

use super::connection::ConnectionRegistry;
use super::messages::{ControlMessage, ServerMessage};

/// Producer side of the broadcast channel, one clone per session
pub type BroadcastTx = mpsc::UnboundedSender<ControlMessage>;
pub type BroadcastRx = mpsc::UnboundedReceiver<ControlMessage>;

/// Run the broadcast loop until the channel closes
///
/// A message is fully fanned out before the next one is taken off the
/// channel, so events from one sender reach every listener in send order.
pub async fn run_broadcaster(
    mut broadcast_rx: BroadcastRx,
    registry: ConnectionRegistry,
    write_timeout: Duration,
) {
    while let Some(event) = broadcast_rx.recv().await {
        let action = event.action;
        let title = event.payload.title.clone();
        let frame = ServerMessage::Control(event);

        let report = registry.fan_out(&frame, write_timeout).await;

        tracing::debug!(
            action = %action,
            title = %title,
            delivered = report.delivered,
            pruned = report.pruned,
            "Broadcast relayed"
        );
    }

    tracing::info!("Broadcaster shutting down (channel closed)");
}
