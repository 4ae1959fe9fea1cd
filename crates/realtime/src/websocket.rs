//! The duplex channel over a WebSocket connection.

use crate::channel::{ChannelError, ChannelEvent, ChannelEventSender, ChannelHandle, Transport};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{Instrument, debug, info, info_span, warn};
use tutorchat_core::protocol::{InboundFrame, OutboundFrame};

/// Upper bound on how long a single connection attempt may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code reported when the connection ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when a close frame carries no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens channels as WebSocket connections, one tokio task per connection.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, events: ChannelEventSender) -> Box<dyn ChannelHandle> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let span = info_span!("ws_channel", url = %url);
        let task = tokio::spawn(run_channel(url.to_string(), outgoing_rx, events).instrument(span));
        Box::new(WsChannel {
            outgoing: outgoing_tx,
            task: Some(task),
        })
    }
}

/// Commands from the handle to its connection task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// Handle to one WebSocket connection task.
pub struct WsChannel {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle for WsChannel {
    fn send(&mut self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        let text = frame.encode()?;
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| ChannelError::Disconnected)
    }

    fn close(mut self: Box<Self>) {
        // The task finishes the close handshake on its own.
        let _ = self.outgoing.send(Outgoing::Close);
        self.task.take();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Channel handle dropped without close; aborting connection task.");
            task.abort();
        }
    }
}

/// Drives one connection from the connect attempt to teardown.
async fn run_channel(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: ChannelEventSender,
) {
    let connecting = time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()));
    tokio::pin!(connecting);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok(Ok((ws_stream, _))) => break ws_stream,
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to connect.");
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    return;
                }
                Err(_) => {
                    warn!(timeout = ?CONNECT_TIMEOUT, "Connect attempt timed out.");
                    let _ = events.send(ChannelEvent::Error(format!(
                        "connect timed out after {:?}",
                        CONNECT_TIMEOUT
                    )));
                    return;
                }
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(_)) => warn!("Dropping frame written before the channel opened."),
                Some(Outgoing::Close) | None => {
                    debug!("Channel closed while still connecting.");
                    return;
                }
            },
        }
    };

    info!("Channel open.");
    if events.send(ChannelEvent::Opened).is_err() {
        debug!("Owner went away before the channel opened.");
        return;
    }
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    debug!(frame = %text, "Sending frame.");
                    if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "Failed to write to channel.");
                        let _ = events.send(ChannelEvent::Error(e.to_string()));
                        return;
                    }
                }
                Some(Outgoing::Close) | None => {
                    info!("Closing channel.");
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    let _ = ws_tx.close().await;
                    return;
                }
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match InboundFrame::decode(text.as_str()) {
                    Ok(frame) => {
                        if events.send(ChannelEvent::Frame(frame)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, raw = %text.as_str(), "Dropping malformed frame."),
                },
                Some(Ok(WsMessage::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    info!(code, %reason, "Channel closed by remote.");
                    let _ = events.send(ChannelEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading from channel.");
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    return;
                }
                None => {
                    info!("Channel stream ended without a close frame.");
                    let _ = events.send(ChannelEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: String::new(),
                    });
                    return;
                }
            },
        }
    }
}
