//! Core logic for the voice-call bridge.
//!
//! Two independent pieces live here:
//!
//! - [`credential`] and [`signature`]: room login tokens and management API
//!   request signatures.
//! - [`chunk`] and [`transcript`]: decoding of room channel transcript chunks
//!   and their reassembly into an ordered transcript.

pub mod chunk;
pub mod credential;
pub mod error;
pub mod signature;
pub mod transcript;

pub use chunk::{Chunk, ChunkData, ChunkEvent, SpeakerRole};
pub use credential::{TokenClaims, TokenIssuer, issue_token, verify_token};
pub use error::{ConfigError, CredentialError, CryptoError, ParseError};
pub use signature::{RequestSigner, SignatureNonce, SignedQuery, sign_request};
pub use transcript::{
    ChunkOutcome, LineUpdate, SharedTranscript, Transcript, TranscriptEvent, TranscriptLine,
};
