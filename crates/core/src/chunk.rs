//! Room channel chunk events.
//!
//! The agent pushes transcript fragments into the RTC room as JSON messages:
//!
//! ```json
//! {"Timestamp": 1700000000000, "SeqId": 7, "Round": 2, "Cmd": 3,
//!  "Data": {"Text": "hello", "MessageId": "m-1", "EndFlag": false}}
//! ```
//!
//! `Cmd` 3 carries user speech recognition results, `Cmd` 4 carries the
//! agent's generated reply. Every other command decodes to
//! [`ChunkEvent::Unknown`] without looking at its data block.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Speech recognition text for the user's utterance (full text per chunk).
pub const CMD_ASR: i64 = 3;
/// Generated agent reply text (incremental fragment per chunk).
pub const CMD_LLM: i64 = 4;

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    User,
    Agent,
}

/// The `Data` block of a recognized chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkData {
    pub text: String,
    pub message_id: String,
    #[serde(default)]
    pub end_flag: bool,
}

/// One decoded transcript fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_id: i64,
    pub message_id: String,
    pub text: String,
    /// Set on the last chunk of an utterance.
    pub end_flag: bool,
}

impl Chunk {
    fn from_data(sequence_id: i64, data: ChunkData) -> Self {
        Self {
            sequence_id,
            message_id: data.message_id,
            text: data.text,
            end_flag: data.end_flag,
        }
    }
}

/// A room channel event as far as transcript reassembly is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    /// User speech, each chunk replaces the utterance text.
    Asr(Chunk),
    /// Agent reply, each chunk appends to the utterance text.
    Llm(Chunk),
    /// Any other command. Never an error.
    Unknown { cmd: i64, sequence_id: i64 },
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoomMessage {
    seq_id: i64,
    cmd: i64,
    #[serde(default)]
    data: serde_json::Value,
}

impl ChunkEvent {
    /// Builds an event from an already split command, sequence id and data block.
    pub fn from_parts(cmd: i64, sequence_id: i64, data: ChunkData) -> Self {
        match cmd {
            CMD_ASR => Self::Asr(Chunk::from_data(sequence_id, data)),
            CMD_LLM => Self::Llm(Chunk::from_data(sequence_id, data)),
            cmd => Self::Unknown { cmd, sequence_id },
        }
    }

    /// Decodes a raw room channel message.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let msg: RoomMessage = serde_json::from_str(raw)?;
        if msg.cmd != CMD_ASR && msg.cmd != CMD_LLM {
            return Ok(Self::Unknown {
                cmd: msg.cmd,
                sequence_id: msg.seq_id,
            });
        }
        let data: ChunkData = serde_json::from_value(msg.data).map_err(|source| {
            ParseError::Data {
                cmd: msg.cmd,
                source,
            }
        })?;
        Ok(Self::from_parts(msg.cmd, msg.seq_id, data))
    }

    pub fn role(&self) -> Option<SpeakerRole> {
        match self {
            Self::Asr(_) => Some(SpeakerRole::User),
            Self::Llm(_) => Some(SpeakerRole::Agent),
            Self::Unknown { .. } => None,
        }
    }

    pub fn sequence_id(&self) -> i64 {
        match self {
            Self::Asr(chunk) | Self::Llm(chunk) => chunk.sequence_id,
            Self::Unknown { sequence_id, .. } => *sequence_id,
        }
    }
}
