//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};
use voicebridge_core::transcript::{LineUpdate, TranscriptLine, UpdateKind};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A raw room channel message, exactly as received from the RTC room.
    RoomMessage { content: String },
    /// Clears the transcript, e.g. when a new call starts on the same socket.
    Reset,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A transcript line was inserted at, or changed in place at, `position`.
    TranscriptUpdate {
        kind: UpdateKind,
        position: usize,
        line: TranscriptLine,
    },
    /// The transcript was cleared.
    TranscriptReset,
    /// A room message could not be decoded. The session continues.
    ChunkRejected { message: String },
    /// The client sent something that is not a protocol message.
    Error { message: String },
}

impl From<&LineUpdate> for ServerMessage {
    fn from(update: &LineUpdate) -> Self {
        Self::TranscriptUpdate {
            kind: update.kind,
            position: update.position,
            line: update.line.clone(),
        }
    }
}
