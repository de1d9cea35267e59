//! WebSocket transport for messaging sessions.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::RealtimeState;
use crate::frame::Frame;
use crate::session::{Flow, Session};

/// Sub-protocols offered to STOMP clients.
const STOMP_PROTOCOLS: [&str; 3] = ["v12.stomp", "v11.stomp", "v10.stomp"];

/// `GET /ws`: upgrade to a STOMP-over-WebSocket session.
pub async fn ws_handler(
    State(state): State<RealtimeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.protocols(STOMP_PROTOCOLS)
        .on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: RealtimeState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (mut session, mut outbound) = Session::new(&state);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if sender.send(Message::Text(frame.encode().into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let flow = match incoming {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => session.handle_text(text).await,
                        Err(_) => {
                            let error = Frame::error("malformed frame", "frames must be UTF-8 text");
                            let _ = sender.send(Message::Text(error.encode().into())).await;
                            Flow::Close
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => {
                        debug!(session_id = %session.id(), error = %e, "WebSocket receive failed");
                        break;
                    }
                };
                if flow == Flow::Close {
                    while let Ok(frame) = outbound.try_recv() {
                        if sender.send(Message::Text(frame.encode().into())).await.is_err() {
                            break;
                        }
                    }
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }
    drop(session);
}
