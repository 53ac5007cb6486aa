//! WebSocket playback relay
//!
//! This module handles:
//! - Control message protocol (play, pause, seek, track change)
//! - The registry of open listener connections
//! - The hub and its single broadcaster task
//! - Per-connection sessions and the HTTP upgrade boundary

pub mod broadcaster;
pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod session;

pub use connection::{ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryError, FanOutReport};
pub use handler::{ws_handler, ws_router, OriginPolicy, WsState};
pub use hub::{Hub, HubError, HubSettings};
pub use messages::{Action, AudioInfo, ControlMessage, ServerMessage, SongListMessage};
pub use session::{run_session, SessionEnd};
