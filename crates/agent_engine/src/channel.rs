//! Push channel: one WebSocket to the backend with bounded automatic
//! reconnection.
//!
//! A single worker task owns the socket and the [`ConnectionState`]. Commands
//! arrive through [`StatusChannel`]; every state change is published to the
//! event sink as a snapshot.
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{CloseOutcome, ConnectionState, ReconnectPolicy};
use agent_logging::{agent_debug, agent_error, agent_info, agent_warn};
use futures_util::{future, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::wire::{self, PushFrame};
use crate::{EngineEvent, EventSink, UpdateSource};

/// Text frames from an open connection. The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection error: {0}")]
    Transport(String),
}

/// Opens push connections.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<FrameStream, ChannelError>;
}

#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<FrameStream, ChannelError> {
        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (socket, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| ChannelError::Connect("timed out".to_string()))?
            .map_err(|err| ChannelError::Connect(err.to_string()))?;

        let frames = socket.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        agent_debug!("Ignoring non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(_) => None,
                Err(err) => Some(Err(ChannelError::Transport(err.to_string()))),
            })
        });
        Ok(Box::pin(frames))
    }
}

#[derive(Debug)]
enum ChannelCommand {
    Connect,
    Reconnect,
    Close,
}

/// Handle to the channel worker. Dropping it closes the channel.
#[derive(Debug)]
pub struct StatusChannel {
    cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
}

impl StatusChannel {
    /// Spawns the worker on the current tokio runtime. Nothing connects until
    /// [`StatusChannel::connect`] is called.
    pub fn spawn(
        url: Url,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let worker = ChannelWorker {
            url,
            policy,
            connector,
            sink,
            cmd_rx,
            state: ConnectionState::new(),
        };
        tokio::spawn(worker.run());
        Self { cmd_tx }
    }

    /// Opens the connection. Ignored while the server is shutting down or
    /// after retries are exhausted.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Connect);
    }

    /// Clears shutdown and exhaustion and connects afresh.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Reconnect);
    }

    pub fn close(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Close);
    }
}

enum Phase {
    Waiting,
    Connecting,
    Backoff(Duration),
    Exit,
}

enum Wake<T> {
    Io(T),
    Command(Option<ChannelCommand>),
}

struct ChannelWorker {
    url: Url,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,
    cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    state: ConnectionState,
}

impl ChannelWorker {
    async fn run(mut self) {
        let mut phase = Phase::Waiting;
        loop {
            phase = match phase {
                Phase::Waiting => {
                    let command = self.cmd_rx.recv().await;
                    self.on_command(command).unwrap_or(Phase::Waiting)
                }
                Phase::Connecting => self.connect_once().await,
                Phase::Backoff(delay) => self.backoff(delay).await,
                Phase::Exit => break,
            };
        }
        agent_debug!("Push channel worker for {} stopped", self.url);
    }

    /// Maps a command to the next phase; `None` leaves the current phase alone.
    fn on_command(&mut self, command: Option<ChannelCommand>) -> Option<Phase> {
        match command {
            Some(ChannelCommand::Connect) => {
                if !self.state.can_auto_connect() {
                    agent_debug!("Ignoring connect request; manual reconnect required");
                    return None;
                }
                self.mark_disconnected();
                Some(Phase::Connecting)
            }
            Some(ChannelCommand::Reconnect) => {
                agent_info!("Manual reconnect to {}", self.url);
                self.state.reset_for_manual();
                self.state.is_connected = false;
                self.publish();
                Some(Phase::Connecting)
            }
            Some(ChannelCommand::Close) | None => {
                self.mark_disconnected();
                Some(Phase::Exit)
            }
        }
    }

    async fn connect_once(&mut self) -> Phase {
        agent_debug!("Connecting to push channel {}", self.url);
        let wake = tokio::select! {
            result = self.connector.connect(&self.url) => Wake::Io(result),
            command = self.cmd_rx.recv() => Wake::Command(command),
        };
        match wake {
            Wake::Io(Ok(frames)) => {
                agent_info!("Push channel connected to {}", self.url);
                self.state.on_open();
                self.publish();
                self.pump(frames).await
            }
            Wake::Io(Err(err)) => self.after_close(Some(err.to_string())),
            Wake::Command(command) => self.on_command(command).unwrap_or(Phase::Connecting),
        }
    }

    async fn pump(&mut self, mut frames: FrameStream) -> Phase {
        loop {
            let wake = tokio::select! {
                frame = frames.next() => Wake::Io(frame),
                command = self.cmd_rx.recv() => Wake::Command(command),
            };
            match wake {
                Wake::Io(Some(Ok(text))) => self.handle_frame(&text),
                Wake::Io(Some(Err(err))) => return self.after_close(Some(err.to_string())),
                Wake::Io(None) => return self.after_close(None),
                Wake::Command(command) => {
                    if let Some(phase) = self.on_command(command) {
                        return phase;
                    }
                }
            }
        }
    }

    async fn backoff(&mut self, delay: Duration) -> Phase {
        agent_debug!("Reconnecting in {:?}", delay);
        let wake = tokio::select! {
            _ = tokio::time::sleep(delay) => Wake::Io(()),
            command = self.cmd_rx.recv() => Wake::Command(command),
        };
        match wake {
            Wake::Io(()) => Phase::Connecting,
            Wake::Command(command) => self.on_command(command).unwrap_or(Phase::Backoff(delay)),
        }
    }

    fn after_close(&mut self, reason: Option<String>) -> Phase {
        let outcome = self.state.on_close(reason, &self.policy);
        self.publish();
        match outcome {
            CloseOutcome::Retry(delay) => {
                agent_warn!(
                    "Push channel lost (attempt {}): {}",
                    self.state.attempt_count,
                    self.state.last_error.as_deref().unwrap_or("closed")
                );
                Phase::Backoff(delay)
            }
            CloseOutcome::Suppressed => {
                agent_info!("Push channel closed during server shutdown; not reconnecting");
                Phase::Waiting
            }
            CloseOutcome::Exhausted => {
                agent_error!(
                    "{}",
                    self.state.last_error.as_deref().unwrap_or("Push channel gave up")
                );
                Phase::Waiting
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match wire::parse_push_frame(text) {
            Ok(PushFrame::AgentStatus(payload)) => {
                self.sink.emit(EngineEvent::Status {
                    source: UpdateSource::Push,
                    update: payload.into_update(),
                });
            }
            Ok(PushFrame::ServerStatus(payload)) if payload.is_shutdown() => {
                let message = payload.message.unwrap_or_default();
                agent_warn!("Server announced shutdown: {}", message);
                self.state.on_shutdown(&message);
                self.publish();
            }
            Ok(PushFrame::ServerStatus(payload)) => {
                agent_info!(
                    "Server status {}: {}",
                    payload.status.as_deref().unwrap_or("-"),
                    payload.message.as_deref().unwrap_or("")
                );
            }
            Ok(PushFrame::Unknown) => agent_debug!("Ignoring push frame of unknown type"),
            Err(err) => agent_warn!("Dropping malformed push frame: {}", err),
        }
    }

    fn mark_disconnected(&mut self) {
        if self.state.is_connected {
            self.state.is_connected = false;
            self.publish();
        }
    }

    fn publish(&self) {
        self.sink.emit(EngineEvent::Connection(self.state.clone()));
    }
}
