//! Transcript WebSocket
//!
//! The browser relays the raw room channel messages it receives from the RTC
//! room; the server reassembles them into an ordered transcript and pushes
//! every line change back.
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle and the per-connection transcript.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
