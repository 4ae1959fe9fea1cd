//! The session actor and its handle.
//!
//! One tokio task owns the channel state, the channel handle, the messages
//! waiting on the settle delay and the conversation log. Learner commands,
//! channel events, fallback replies and the settle timer all reach it as
//! messages and are applied one at a time, so there is a single writer for
//! every piece of session state.

use crate::{
    error::SessionError,
    fallback::{FallbackChannel, FallbackError},
    state::ChannelState,
};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{Instrument, debug, info, info_span, warn};
use tutorchat_core::{
    conversation::{ConversationLog, Origin, Snapshot, Speaker},
    identity::{IdentitySource, SessionIdentity},
    protocol::{FallbackRequest, InboundFrame, OutboundFrame},
};
use tutorchat_realtime::{ChannelError, ChannelEvent, ChannelHandle, Transport};


/// How long a message waits for a freshly requested channel before it is sent
/// through the fallback instead.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// The system line appended when the learner ends the conversation.
pub const CLOSED_TEXT: &str = "Conversation ended.";

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Where the session connects.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel_url: String,
}

impl SessionConfig {
    pub fn new(channel_url: impl Into<String>) -> Self {
        Self {
            channel_url: channel_url.into(),
        }
    }
}

/// What consumers render: the channel state and the log at one point in time.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub state: ChannelState,
    pub records: Snapshot,
    /// Bumped by every reset; record sequences restart when it changes.
    pub epoch: u64,
}

enum SessionCommand {
    Send {
        text: String,
        ack: oneshot::Sender<u64>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
    Reset {
        ack: oneshot::Sender<()>,
    },
}

/// A message waiting for the channel to settle.
#[derive(Debug)]
struct PendingSend {
    sequence: u64,
    text: String,
    deadline: Instant,
}

/// A finished fallback request, tagged with the session epoch it belongs to.
struct FallbackOutcome {
    epoch: u64,
    sequence: u64,
    result: Result<String, FallbackError>,
}

/// The caller's side of a running session.
///
/// Dropping the handle ends the session and releases its channel.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Starts a session task. Nothing connects until the first send.
    pub fn spawn(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        fallback: Arc<dyn FallbackChannel>,
        identity_source: Arc<dyn IdentitySource>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (fallback_tx, fallback_rx) = mpsc::unbounded_channel();
        let log = ConversationLog::new();
        let (view_tx, view_rx) = watch::channel(SessionView {
            state: ChannelState::Closed,
            records: log.snapshot(),
            epoch: 0,
        });

        let span = info_span!("session", channel_url = %config.channel_url);
        let actor = SessionActor {
            config,
            transport,
            fallback,
            identity_source,
            identity: None,
            state: ChannelState::Closed,
            channel: None,
            channel_events: None,
            pending: VecDeque::new(),
            log,
            epoch: 0,
            fallback_results: fallback_tx,
            view: view_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx, fallback_rx).instrument(span));

        Self {
            commands: commands_tx,
            view: view_rx,
            task,
        }
    }

    /// Submits a learner message and returns the sequence of its log record.
    ///
    /// The record is in the log by the time this returns; the reply arrives
    /// later.
    pub async fn send(&self, text: impl Into<String>) -> Result<u64, SessionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::Send { text, ack })
            .await
            .map_err(|_| SessionError::Terminated)?;
        done.await.map_err(|_| SessionError::Terminated)
    }

    /// Closes the channel. The state is `Closed` when this returns, and
    /// closing an already closed session does nothing.
    pub async fn close(&self) -> Result<(), SessionError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::Close { ack })
            .await
            .map_err(|_| SessionError::Terminated)?;
        done.await.map_err(|_| SessionError::Terminated)
    }

    /// Drops the channel, the log and the captured identity.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(SessionCommand::Reset { ack })
            .await
            .map_err(|_| SessionError::Terminated)?;
        done.await.map_err(|_| SessionError::Terminated)
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.view.borrow().records.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.view.borrow().state
    }

    /// A feed that changes whenever the channel state or the log changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Ends the session and waits for its channel to be released.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        let _ = task.await;
    }
}

struct SessionActor {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    fallback: Arc<dyn FallbackChannel>,
    identity_source: Arc<dyn IdentitySource>,
    identity: Option<SessionIdentity>,
    state: ChannelState,
    channel: Option<Box<dyn ChannelHandle>>,
    channel_events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    pending: VecDeque<PendingSend>,
    log: ConversationLog,
    epoch: u64,
    fallback_results: mpsc::UnboundedSender<FallbackOutcome>,
    view: watch::Sender<SessionView>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut fallback_results: mpsc::UnboundedReceiver<FallbackOutcome>,
    ) {
        info!("Session started.");
        loop {
            let deadline = self.pending.front().map(|p| p.deadline);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = next_channel_event(&mut self.channel_events) => {
                    self.handle_channel_event(event);
                    self.publish();
                },
                Some(outcome) = fallback_results.recv() => {
                    self.handle_fallback_outcome(outcome);
                    self.publish();
                },
                () = settle(deadline) => {
                    self.settle_next();
                    self.publish();
                },
            }
        }

        self.channel_events = None;
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        info!("Session ended.");
    }

    /// Applies a learner command, publishing the result before acknowledging.
    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Send { text, ack } => {
                let sequence = self.handle_send(text);
                self.publish();
                let _ = ack.send(sequence);
            }
            SessionCommand::Close { ack } => {
                self.close_channel();
                self.publish();
                let _ = ack.send(());
            }
            SessionCommand::Reset { ack } => {
                self.reset();
                self.publish();
                let _ = ack.send(());
            }
        }
    }

    fn handle_send(&mut self, text: String) -> u64 {
        let sequence = self
            .log
            .append(Speaker::User, text.as_str(), Origin::Local)
            .sequence();

        match self.state {
            ChannelState::Open if !self.pending.is_empty() => {
                debug!(sequence, "Earlier messages still settling; queued behind them.");
                self.queue_pending(sequence, text);
            }
            ChannelState::Open => self.send_on_channel(sequence, text),
            ChannelState::Connecting => {
                debug!(sequence, "Channel still connecting; message waits to settle.");
                self.queue_pending(sequence, text);
            }
            ChannelState::Closed | ChannelState::Closing => {
                self.connect();
                self.queue_pending(sequence, text);
            }
        }
        sequence
    }

    fn queue_pending(&mut self, sequence: u64, text: String) {
        self.pending.push_back(PendingSend {
            sequence,
            text,
            deadline: Instant::now() + SETTLE_DELAY,
        });
    }

    fn connect(&mut self) {
        let identity = self.session_identity();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        info!(learner = %identity.display_name, "Opening channel.");
        self.channel = Some(self.transport.open(&self.config.channel_url, events_tx));
        self.channel_events = Some(events_rx);
        self.state = ChannelState::Connecting;
    }

    /// The identity captured at the first connect attempt.
    fn session_identity(&mut self) -> SessionIdentity {
        match &self.identity {
            Some(identity) => identity.clone(),
            None => {
                let identity = self.identity_source.current_identity();
                self.identity = Some(identity.clone());
                identity
            }
        }
    }

    fn send_on_channel(&mut self, sequence: u64, text: String) {
        let frame = OutboundFrame::message(text.as_str());
        let result = match self.channel.as_mut() {
            Some(channel) => channel.send(&frame),
            None => Err(ChannelError::Disconnected),
        };
        match result {
            Ok(()) => debug!(sequence, "Message sent on channel."),
            Err(e) => {
                let failure = SessionError::ChannelLost(e.to_string());
                warn!(sequence, error = %failure, "Channel unusable; sending through fallback.");
                self.release_channel();
                self.dispatch_fallback(sequence, text);
            }
        }
    }

    /// Sends the oldest waiting message on whichever path is usable now.
    ///
    /// On an open channel everything queued behind it follows in order, so
    /// the remote sees messages in submission order.
    fn settle_next(&mut self) {
        let Some(pending) = self.pending.pop_front() else {
            return;
        };
        if self.state.is_open() {
            self.send_on_channel(pending.sequence, pending.text);
            while self.state.is_open() {
                let Some(next) = self.pending.pop_front() else {
                    break;
                };
                self.send_on_channel(next.sequence, next.text);
            }
        } else {
            info!(
                sequence = pending.sequence,
                state = %self.state,
                "Channel not open after settle delay; using fallback."
            );
            self.dispatch_fallback(pending.sequence, pending.text);
        }
    }

    fn dispatch_fallback(&mut self, sequence: u64, text: String) {
        let identity = self.session_identity();
        let payload = FallbackRequest::new(text, &identity, self.log.prior_turns(sequence));
        let fallback = Arc::clone(&self.fallback);
        let results = self.fallback_results.clone();
        let epoch = self.epoch;
        tokio::spawn(
            async move {
                let result = fallback.request(payload).await;
                let _ = results.send(FallbackOutcome {
                    epoch,
                    sequence,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    fn handle_fallback_outcome(&mut self, outcome: FallbackOutcome) {
        if outcome.epoch != self.epoch {
            debug!(sequence = outcome.sequence, "Discarding fallback reply from before reset.");
            return;
        }
        match outcome.result {
            Ok(reply) => {
                debug!(sequence = outcome.sequence, "Fallback answered.");
                self.log.append(Speaker::Agent, reply, Origin::Fallback);
            }
            Err(e) => {
                let failure = SessionError::SendFailure(e);
                warn!(sequence = outcome.sequence, error = %failure, "Fallback request failed.");
                self.log
                    .append(Speaker::Error, failure.user_message(), Origin::Local);
            }
        }
    }

    fn handle_channel_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Opened) => self.on_open(),
            Some(ChannelEvent::Frame(frame)) => self.on_frame(frame),
            Some(ChannelEvent::Error(cause)) => self.on_error(cause),
            Some(ChannelEvent::Closed { code, reason }) => {
                info!(code, %reason, "Channel closed by remote.");
                self.release_channel();
            }
            None => {
                debug!("Channel task ended.");
                self.release_channel();
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != ChannelState::Connecting {
            debug!(state = %self.state, "Ignoring open for a channel that is not connecting.");
            return;
        }
        self.state = ChannelState::Open;
        let handshake = OutboundFrame::handshake(&self.session_identity());
        let result = match self.channel.as_mut() {
            Some(channel) => channel.send(&handshake),
            None => Err(ChannelError::Disconnected),
        };
        match result {
            Ok(()) => info!("Channel open; handshake sent."),
            Err(e) => {
                warn!(error = %e, "Handshake could not be sent.");
                self.release_channel();
            }
        }
    }

    fn on_frame(&mut self, frame: InboundFrame) {
        if let Some(echo) = frame.echo() {
            debug!(echo, "Remote confirmed a learner message.");
        }
        if let Some(reply) = frame.reply() {
            self.log.append(Speaker::Agent, reply, Origin::Channel);
        }
    }

    fn on_error(&mut self, cause: String) {
        let was_open = self.state.is_open();
        self.release_channel();
        if was_open {
            let failure = SessionError::ChannelLost(cause);
            warn!(error = %failure, "Channel failed.");
            self.log
                .append(Speaker::Error, failure.user_message(), Origin::Local);
        } else {
            let failure = SessionError::ConnectFailure(cause);
            warn!(
                error = %failure,
                waiting = self.pending.len(),
                "Channel could not be opened; waiting messages will use the fallback."
            );
        }
    }

    /// Forgets the current channel after it failed or was closed remotely.
    fn release_channel(&mut self) {
        self.channel_events = None;
        self.channel = None;
        self.state = ChannelState::Closed;
    }

    fn close_channel(&mut self) {
        if self.state == ChannelState::Closed {
            debug!("Close requested with no channel; nothing to do.");
            return;
        }
        self.state = ChannelState::Closing;
        self.channel_events = None;
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.state = ChannelState::Closed;
        self.log
            .append(Speaker::System, CLOSED_TEXT, Origin::Local);
        info!("Channel closed by learner.");
    }

    fn reset(&mut self) {
        self.channel_events = None;
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.state = ChannelState::Closed;
        self.pending.clear();
        self.log.reset();
        self.identity = None;
        self.epoch += 1;
        info!(epoch = self.epoch, "Session reset.");
    }

    /// Publishes a new view only when the state or the log changed.
    fn publish(&self) {
        self.view.send_if_modified(|view| {
            let unchanged = view.state == self.state
                && view.epoch == self.epoch
                && view.records.len() == self.log.len();
            if unchanged {
                return false;
            }
            *view = SessionView {
                state: self.state,
                records: self.log.snapshot(),
                epoch: self.epoch,
            };
            true
        });
    }
}

async fn next_channel_event(
    events: &mut Option<mpsc::UnboundedReceiver<ChannelEvent>>,
) -> Option<ChannelEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn settle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
