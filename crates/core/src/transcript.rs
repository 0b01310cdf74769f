//! Transcript Reassembly
//!
//! Turns the chunk stream of a call into an ordered list of transcript lines.
//! Lines live in an arena addressed by [`LineHandle`]; `message_id` is only a
//! secondary index into it, and the live accumulation state of unfinished
//! utterances is keyed by the same handle.
//!
//! User speech chunks carry the full current text and are ordered by sequence
//! id, so late or duplicated chunks are dropped. Agent reply chunks carry
//! fragments that are concatenated in arrival order.
//!
//! A [`Transcript`] is owned by one task. Hosts that apply chunks from several
//! threads wrap it in a [`SharedTranscript`] so that every apply runs under a
//! single lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkEvent, SpeakerRole};
use crate::error::ParseError;

/// Position of a line in the transcript arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineHandle(usize);

impl LineHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One utterance as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub message_id: String,
    pub speaker_role: SpeakerRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_complete: bool,
}

/// Accumulation state of an utterance that has not seen its terminal chunk.
/// The accumulated text itself is the content of the line it points at.
#[derive(Debug, Clone, Copy)]
struct Accumulation {
    role: SpeakerRole,
    last_sequence_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Inserted,
    Updated,
}

/// A line that was inserted or changed by a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineUpdate {
    pub kind: UpdateKind,
    pub position: usize,
    pub line: TranscriptLine,
}

/// Result of applying one chunk event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Applied(LineUpdate),
    /// A user chunk at or below the last applied sequence id.
    StaleDropped,
    /// Unrecognized command.
    Ignored,
}

impl ChunkOutcome {
    pub fn update(&self) -> Option<&LineUpdate> {
        match self {
            Self::Applied(update) => Some(update),
            Self::StaleDropped | Self::Ignored => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    pub applied: u64,
    pub stale_dropped: u64,
    pub ignored: u64,
    pub parse_failures: u64,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, Copy)]
pub enum TranscriptEvent<'a> {
    Updated(&'a LineUpdate),
    Reset,
}

type Listener = Box<dyn FnMut(TranscriptEvent<'_>) + Send>;

/// Per-call transcript state.
#[derive(Default)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
    by_message: HashMap<String, LineHandle>,
    live: HashMap<LineHandle, Accumulation>,
    stats: ReassemblyStats,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("lines", &self.lines)
            .field("live", &self.live.len())
            .field("stats", &self.stats)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A transcript shared between threads; one lock spans a whole apply.
pub type SharedTranscript = Arc<Mutex<Transcript>>;

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedTranscript {
        Arc::new(Mutex::new(self))
    }

    /// Registers a callback fired on every line update and on reset.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(TranscriptEvent<'_>) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Decodes and applies a raw room channel message.
    ///
    /// A malformed message is counted and returned as an error; the
    /// transcript is left untouched.
    pub fn ingest(&mut self, raw: &str) -> Result<ChunkOutcome, ParseError> {
        match ChunkEvent::parse(raw) {
            Ok(event) => Ok(self.apply(event)),
            Err(e) => {
                self.stats.parse_failures += 1;
                warn!(error = %e, "Dropping malformed transcript chunk");
                Err(e)
            }
        }
    }

    /// Applies a decoded chunk event.
    pub fn apply(&mut self, event: ChunkEvent) -> ChunkOutcome {
        let (role, chunk) = match event {
            ChunkEvent::Asr(chunk) => (SpeakerRole::User, chunk),
            ChunkEvent::Llm(chunk) => (SpeakerRole::Agent, chunk),
            ChunkEvent::Unknown { cmd, sequence_id } => {
                self.stats.ignored += 1;
                debug!(cmd, sequence_id, "Ignoring unknown room command");
                return ChunkOutcome::Ignored;
            }
        };

        let handle = self.by_message.get(&chunk.message_id).copied();
        let last_sequence_id = handle
            .and_then(|h| self.live.get(&h))
            .filter(|acc| acc.role == role)
            .map(|acc| acc.last_sequence_id);

        let content = match (role, last_sequence_id, handle) {
            (SpeakerRole::User, Some(last), _) if chunk.sequence_id <= last => {
                self.stats.stale_dropped += 1;
                debug!(
                    message_id = %chunk.message_id,
                    sequence_id = chunk.sequence_id,
                    last_sequence_id = last,
                    "Dropping stale speech chunk"
                );
                return ChunkOutcome::StaleDropped;
            }
            (SpeakerRole::Agent, Some(_), Some(h)) => {
                let mut text = self.lines[h.0].content.clone();
                text.push_str(&chunk.text);
                text
            }
            _ => chunk.text.clone(),
        };

        let update = self.write_line(handle, role, &chunk, content);
        self.stats.applied += 1;
        for listener in &mut self.listeners {
            listener(TranscriptEvent::Updated(&update));
        }
        ChunkOutcome::Applied(update)
    }

    fn write_line(
        &mut self,
        handle: Option<LineHandle>,
        role: SpeakerRole,
        chunk: &Chunk,
        content: String,
    ) -> LineUpdate {
        let (handle, kind) = match handle {
            Some(h) => {
                let line = &mut self.lines[h.0];
                line.speaker_role = role;
                line.content = content;
                line.is_complete = chunk.end_flag;
                (h, UpdateKind::Updated)
            }
            None => {
                let h = LineHandle(self.lines.len());
                self.lines.push(TranscriptLine {
                    message_id: chunk.message_id.clone(),
                    speaker_role: role,
                    content,
                    created_at: Utc::now(),
                    is_complete: chunk.end_flag,
                });
                self.by_message.insert(chunk.message_id.clone(), h);
                (h, UpdateKind::Inserted)
            }
        };

        if chunk.end_flag {
            self.live.remove(&handle);
        } else {
            self.live.insert(
                handle,
                Accumulation {
                    role,
                    last_sequence_id: chunk.sequence_id,
                },
            );
        }

        LineUpdate {
            kind,
            position: handle.0,
            line: self.lines[handle.0].clone(),
        }
    }

    /// Drops every line and all accumulation state. Subscribers are kept.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.by_message.clear();
        self.live.clear();
        self.stats = ReassemblyStats::default();
        for listener in &mut self.listeners {
            listener(TranscriptEvent::Reset);
        }
    }

    /// Lines in first-seen order.
    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn line(&self, message_id: &str) -> Option<&TranscriptLine> {
        self.by_message.get(message_id).map(|h| &self.lines[h.0])
    }

    pub fn handle(&self, message_id: &str) -> Option<LineHandle> {
        self.by_message.get(message_id).copied()
    }

    /// Whether `message_id` has an unfinished accumulation.
    pub fn is_live(&self, message_id: &str) -> bool {
        self.handle(message_id)
            .is_some_and(|h| self.live.contains_key(&h))
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }
}
