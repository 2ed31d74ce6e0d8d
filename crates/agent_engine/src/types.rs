use std::fmt;

use agent_core::{AgentStatusUpdate, ConnectionState, PollerExit, PollingHint, PreloadId, RequestId};

use crate::preload::{DecodedImage, PreloadError};

/// Where a status update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Connection(ConnectionState),
    Status {
        source: UpdateSource,
        update: AgentStatusUpdate,
    },
    TaskCreated {
        request: RequestId,
        result: Result<CreatedTask, GatewayError>,
    },
    TaskStopped {
        task_id: String,
        result: Result<StopReceipt, GatewayError>,
    },
    RunningAgent(Result<AgentStatusUpdate, GatewayError>),
    PollerFinished {
        task_id: String,
        exit: PollerExit,
    },
    PreloadFinished {
        id: PreloadId,
        result: Result<DecodedImage, PreloadError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTask {
    pub task_id: String,
    pub polling: Option<PollingHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StopReceipt {
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: FailureKind,
    pub message: String,
}

impl GatewayError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The body was not the JSON shape the endpoint promises.
    InvalidResponse,
    MissingTaskId,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::MissingTaskId => write!(f, "missing task id"),
        }
    }
}
