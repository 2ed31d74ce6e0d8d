use std::time::Duration;

use crate::{AgentStatusUpdate, ConnectionState, PreloadId};

pub type RequestId = u64;

/// Polling instructions returned alongside a freshly created task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollingHint {
    pub status_endpoint: Option<String>,
    pub interval: Option<Duration>,
}

/// Why a stop request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopFailure {
    /// The backend answered and refused; carries its reason.
    Rejected(String),
    /// The request never got an answer (network error or timeout).
    Unreachable,
}

/// Why a poller ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The last response reported a terminal or idle status.
    Settled,
    /// The request ceiling was reached.
    AttemptsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The console finished start-up.
    Started,
    /// User submitted an instruction for the agent.
    InstructionSubmitted(String),
    /// User asked to stop the active task.
    StopClicked,
    /// User asked to reconnect the push channel.
    ReconnectClicked,
    /// The backend accepted a create request.
    TaskCreated {
        request: RequestId,
        task_id: String,
        polling: Option<PollingHint>,
    },
    /// The create request was rejected or never reached the backend.
    TaskCreateFailed { request: RequestId, message: String },
    /// Result of a stop request.
    StopCompleted {
        task_id: String,
        result: Result<(), StopFailure>,
    },
    /// Status update from the push channel or the poller.
    StatusReceived(AgentStatusUpdate),
    /// Start-up check found an agent that is already running.
    RunningAgentDiscovered(AgentStatusUpdate),
    /// Push-channel health changed.
    ConnectionChanged(ConnectionState),
    /// The poller for `task_id` stopped by itself.
    PollerFinished { task_id: String, exit: PollerExit },
    /// A screenshot preload finished.
    PreloadFinished { id: PreloadId, ok: bool },
    /// Render tick.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
