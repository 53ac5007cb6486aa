//! WebSocket message types for playback synchronization
//!
//! Every frame is a JSON text message. Clients send [`ControlMessage`]s; the
//! server answers once with a [`SongListMessage`] handshake and afterwards
//! relays each control message verbatim to every listener, sender included.

use serde::{Deserialize, Serialize};

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Playback transport action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Play,
    Pause,
    Seek,
    NewTrack,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Play => "PLAY",
            Action::Pause => "PAUSE",
            Action::Seek => "SEEK",
            Action::NewTrack => "NEW_TRACK",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Track the action refers to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AudioInfo {
    /// File name as listed in the handshake
    pub title: String,

    /// File size in bytes
    pub size: i64,

    /// Track length in seconds
    pub duration: f64,
}

/// One playback-transport event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMessage {
    pub action: Action,
    pub payload: AudioInfo,
}

impl ControlMessage {
    pub fn new(action: Action, payload: AudioInfo) -> Self {
        Self { action, payload }
    }

    /// Decode a single text frame
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Handshake carrying the catalog snapshot taken at connect time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SongListMessage {
    pub songs: Vec<String>,
}

/// Frames written to a client
///
/// Untagged: the handshake and relayed events keep their bare wire shapes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    SongList(SongListMessage),
    Control(ControlMessage),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<SongListMessage> for ServerMessage {
    fn from(msg: SongListMessage) -> Self {
        ServerMessage::SongList(msg)
    }
}

impl From<ControlMessage> for ServerMessage {
    fn from(msg: ControlMessage) -> Self {
        ServerMessage::Control(msg)
    }
}
