use tokio::sync::mpsc;
use tutorchat_core::protocol::{InboundFrame, OutboundFrame};

/// Lifecycle and data events raised by an open or opening channel.
///
/// Each `open` is followed by exactly one `Opened` or one terminal `Error`.
/// After `Opened`, at most one `Closed` (or terminal `Error`) follows, and
/// nothing is raised after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Frame(InboundFrame),
    Error(String),
    Closed { code: u16, reason: String },
}

/// The queue a channel reports into.
pub type ChannelEventSender = mpsc::UnboundedSender<ChannelEvent>;

/// Errors raised when writing to a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is no longer connected")]
    Disconnected,
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Opens duplex channels to a remote endpoint.
pub trait Transport: Send + Sync {
    /// Starts connecting to `url` without waiting for the outcome.
    ///
    /// The outcome, and every later event, arrives on `events`.
    fn open(&self, url: &str, events: ChannelEventSender) -> Box<dyn ChannelHandle>;
}

/// The owner's grip on one channel.
///
/// Dropping a handle without calling [`ChannelHandle::close`] still releases
/// the underlying connection.
pub trait ChannelHandle: Send {
    /// Writes one frame. Only valid once the channel has reported `Opened`;
    /// frames are never buffered while connecting.
    fn send(&mut self, frame: &OutboundFrame) -> Result<(), ChannelError>;

    /// Closes the channel. No further events are delivered to the owner.
    fn close(self: Box<Self>);
}
