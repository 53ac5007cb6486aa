//! Broadcast hub
//!
//! Owns the connection registry and the producer side of the broadcast
//! channel, and spawns the broadcaster when constructed. Hubs are independent
//! of each other; clone one to share it between sessions.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::broadcaster::{run_broadcaster, BroadcastTx};
use super::connection::{ConnectionHandle, ConnectionRegistry};
use super::messages::{ControlMessage, ServerMessage};

/// Default per-write deadline during fan-out
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Tuning knobs for fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// How long a single write may wait for room in a peer's queue
    pub write_timeout: Duration,

    /// Messages buffered per connection before writes start to wait
    pub outbound_buffer: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("broadcaster is not running")]
    BroadcasterStopped,
}

/// Process-wide relay hub
#[derive(Debug, Clone)]
pub struct Hub {
    registry: ConnectionRegistry,
    broadcast_tx: BroadcastTx,
    settings: HubSettings,
}

impl Hub {
    /// Create a hub and start its broadcaster
    ///
    /// Must be called from within a tokio runtime. The broadcaster runs until
    /// the last clone of the hub is dropped.
    pub fn spawn(settings: HubSettings) -> Self {
        let registry = ConnectionRegistry::new();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_broadcaster(
            broadcast_rx,
            registry.clone(),
            settings.write_timeout,
        ));

        tracing::debug!(
            write_timeout_ms = settings.write_timeout.as_millis() as u64,
            outbound_buffer = settings.outbound_buffer,
            "Hub started"
        );

        Self {
            registry,
            broadcast_tx,
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Build a handle and its outbound queue for a new session
    ///
    /// The handle is not registered yet; the session does that.
    pub fn open_connection(&self) -> (ConnectionHandle, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(self.settings.outbound_buffer.max(1));
        (ConnectionHandle::new(tx, CancellationToken::new()), rx)
    }

    /// Queue an event for fan-out. Never blocks.
    pub fn publish(&self, event: ControlMessage) -> Result<(), HubError> {
        self.broadcast_tx
            .send(event)
            .map_err(|_| HubError::BroadcasterStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::messages::{Action, AudioInfo};

    fn seek(title: &str) -> ControlMessage {
        ControlMessage::new(
            Action::Seek,
            AudioInfo {
                title: title.to_string(),
                size: 5,
                duration: 3.0,
            },
        )
    }

    #[tokio::test]
    async fn test_publish_reaches_registered_connection() {
        let hub = Hub::spawn(HubSettings::default());
        let (handle, mut rx) = hub.open_connection();
        hub.registry().register(handle).await;

        hub.publish(seek("a.mp3")).unwrap();

        assert_eq!(rx.recv().await.unwrap(), ServerMessage::Control(seek("a.mp3")));
    }

    #[tokio::test]
    async fn test_hubs_are_isolated() {
        let first = Hub::spawn(HubSettings::default());
        let second = Hub::spawn(HubSettings::default());

        let (handle, mut rx) = second.open_connection();
        second.registry().register(handle).await;

        first.publish(seek("only-first.mp3")).unwrap();
        second.publish(seek("only-second.mp3")).unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::Control(seek("only-second.mp3"))
        );
        assert_eq!(first.connection_count().await, 0);
        assert_eq!(second.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_open_connection_uses_configured_buffer() {
        let hub = Hub::spawn(HubSettings {
            write_timeout: Duration::from_millis(10),
            outbound_buffer: 2,
        });
        let (handle, _rx) = hub.open_connection();

        let frame = ServerMessage::Control(seek("a.mp3"));
        assert!(handle.deliver(frame.clone(), Duration::ZERO).await.is_ok());
        assert!(handle.deliver(frame.clone(), Duration::ZERO).await.is_ok());
        assert!(handle.deliver(frame, Duration::ZERO).await.is_err());
    }
}
