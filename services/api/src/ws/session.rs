//! Manages the transcript WebSocket connection lifecycle.

use super::protocol::{ClientMessage, ServerMessage};
use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use voicebridge_core::transcript::{Transcript, TranscriptEvent};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_socket)
}

/// Main handler for an individual WebSocket connection.
///
/// Each connection owns one transcript for the duration of the call. Line
/// updates reach the socket through the transcript's subscription.
#[instrument(name = "transcript_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New transcript connection.");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let mut transcript = subscribed_transcript(update_tx);

    while let Some(msg_result) = socket_rx.next().await {
        let reply = match msg_result {
            Ok(Message::Text(text)) => process_client_text(&mut transcript, text.as_str()),
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame on transcript socket.");
                None
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => None,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };

        let outgoing = std::iter::from_fn(|| update_rx.try_recv().ok()).chain(reply);
        if let Err(e) = send_all(&mut socket_tx, outgoing).await {
            error!(error = ?e, "Failed to push transcript update, closing session.");
            break;
        }
    }

    let stats = transcript.stats();
    transcript.reset();
    info!(
        applied = stats.applied,
        stale_dropped = stats.stale_dropped,
        ignored = stats.ignored,
        parse_failures = stats.parse_failures,
        "Transcript session finished."
    );
}

/// Creates a transcript whose updates are forwarded to `tx` as server messages.
pub(crate) fn subscribed_transcript(tx: mpsc::UnboundedSender<ServerMessage>) -> Transcript {
    let mut transcript = Transcript::new();
    transcript.subscribe(move |event| {
        let msg = match event {
            TranscriptEvent::Updated(update) => ServerMessage::from(update),
            TranscriptEvent::Reset => ServerMessage::TranscriptReset,
        };
        let _ = tx.send(msg);
    });
    transcript
}

/// Handles one text frame. Returns a direct reply for rejected input; line
/// updates are delivered through the transcript subscription instead.
pub(crate) fn process_client_text(transcript: &mut Transcript, text: &str) -> Option<ServerMessage> {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "Ignoring unrecognized client message.");
            return Some(ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            });
        }
    };

    match msg {
        ClientMessage::RoomMessage { content } => match transcript.ingest(&content) {
            Ok(_) => None,
            Err(e) => Some(ServerMessage::ChunkRejected {
                message: e.to_string(),
            }),
        },
        ClientMessage::Reset => {
            transcript.reset();
            None
        }
    }
}

async fn send_all(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msgs: impl Iterator<Item = ServerMessage>,
) -> Result<()> {
    for msg in msgs {
        send_msg(socket_tx, msg).await?;
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn room_message(cmd: i64, seq: i64, id: &str, text: &str, end: bool) -> String {
        let content = json!({
            "SeqId": seq,
            "Cmd": cmd,
            "Data": { "Text": text, "MessageId": id, "EndFlag": end }
        })
        .to_string();
        json!({ "type": "room_message", "content": content }).to_string()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<Value> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|msg| serde_json::to_value(msg).unwrap())
            .collect()
    }

    #[test]
    fn test_updates_are_pushed_through_subscription() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = subscribed_transcript(tx);

        assert!(process_client_text(&mut transcript, &room_message(4, 1, "a1", "Hel", false)).is_none());
        assert!(process_client_text(&mut transcript, &room_message(4, 2, "a1", "lo", true)).is_none());

        let pushed = drain(&mut rx);
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0]["type"], "transcript_update");
        assert_eq!(pushed[0]["kind"], "inserted");
        assert_eq!(pushed[1]["kind"], "updated");
        assert_eq!(pushed[1]["position"], 0);
        assert_eq!(pushed[1]["line"]["content"], "Hello");
        assert_eq!(pushed[1]["line"]["speaker_role"], "agent");
        assert_eq!(pushed[1]["line"]["is_complete"], true);
    }

    #[test]
    fn test_stale_chunk_pushes_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = subscribed_transcript(tx);

        process_client_text(&mut transcript, &room_message(3, 2, "u1", "hel", false));
        process_client_text(&mut transcript, &room_message(3, 1, "u1", "garbage", false));

        let pushed = drain(&mut rx);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0]["line"]["content"], "hel");
    }

    #[test]
    fn test_malformed_room_message_is_rejected_without_closing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = subscribed_transcript(tx);

        let bad = json!({ "type": "room_message", "content": "{not json" }).to_string();
        let reply = process_client_text(&mut transcript, &bad).unwrap();
        assert_eq!(serde_json::to_value(reply).unwrap()["type"], "chunk_rejected");

        process_client_text(&mut transcript, &room_message(3, 1, "u1", "hi", true));
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(transcript.stats().parse_failures, 1);
    }

    #[test]
    fn test_reset_message_clears_transcript() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = subscribed_transcript(tx);

        process_client_text(&mut transcript, &room_message(3, 1, "u1", "hi", false));
        process_client_text(&mut transcript, r#"{"type":"reset"}"#);

        assert!(transcript.is_empty());
        let pushed = drain(&mut rx);
        assert_eq!(pushed.last().unwrap()["type"], "transcript_reset");
    }

    #[test]
    fn test_unknown_client_message_gets_error_reply() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = subscribed_transcript(tx);

        let reply = process_client_text(&mut transcript, r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }
}
