//! Manages one duplex channel connection from handshake to termination.

use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tutorchat_core::{
    APOLOGY_TEXT,
    identity::SessionIdentity,
    protocol::{HandshakeFrame, HistoryTurn, InboundFrame, MessageFrame},
};

type SocketSink = SplitSink<WebSocket, Message>;
type SocketStream = SplitStream<WebSocket>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one connection: the first text frame must identify the learner,
/// every later `{user}` frame is answered with `{user, bot}`.
#[instrument(name = "ws_session", skip_all, fields(learner))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("New WebSocket connection. Awaiting handshake...");
    let (mut socket_tx, mut socket_rx) = socket.split();

    let identity = match read_handshake(&mut socket_rx).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            info!("Client disconnected before the handshake.");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Rejecting connection without a valid handshake.");
            let _ = socket_tx.send(Message::Close(None)).await;
            return;
        }
    };
    tracing::Span::current().record("learner", identity.display_name.as_str());
    info!(language = %identity.preferred_language, "Handshake received.");

    if let Err(e) = converse(&state, &identity, &mut socket_tx, &mut socket_rx).await {
        error!(error = ?e, "Connection terminated with error.");
    }
    info!("Connection finished.");
}

/// Waits for the first text frame and decodes it as a handshake.
async fn read_handshake(socket_rx: &mut SocketStream) -> Result<Option<SessionIdentity>> {
    while let Some(message) = socket_rx.next().await {
        match message.context("Failed to read handshake")? {
            Message::Text(text) => {
                let handshake: HandshakeFrame = serde_json::from_str(text.as_str())
                    .context("First frame was not a handshake")?;
                if handshake.name.trim().is_empty() {
                    return Err(anyhow!("Handshake carried an empty name"));
                }
                return Ok(Some(SessionIdentity::new(
                    handshake.name,
                    handshake.language,
                )));
            }
            Message::Close(_) => return Ok(None),
            Message::Binary(_) => return Err(anyhow!("First frame was binary")),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
    Ok(None)
}

async fn converse(
    state: &AppState,
    identity: &SessionIdentity,
    socket_tx: &mut SocketSink,
    socket_rx: &mut SocketStream,
) -> Result<()> {
    let mut history: Vec<HistoryTurn> = Vec::new();

    while let Some(message) = socket_rx.next().await {
        let text = match message.context("Failed to read from socket")? {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Client closed the connection.");
                break;
            }
            _ => continue,
        };

        let frame: MessageFrame = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, raw = %text.as_str(), "Ignoring malformed frame.");
                continue;
            }
        };
        debug!(user = %frame.user, "Learner message received.");

        let bot = match state.tutor.reply(identity, &history, &frame.user).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = ?e, "Tutor failed to answer.");
                APOLOGY_TEXT.to_string()
            }
        };
        history.push(HistoryTurn::user(frame.user.clone()));
        history.push(HistoryTurn::bot(bot.clone()));

        let reply = InboundFrame::EchoAndReply {
            user: frame.user,
            bot,
        }
        .encode()?;
        socket_tx
            .send(Message::Text(reply.into()))
            .await
            .context("Failed to send reply")?;
    }
    Ok(())
}
