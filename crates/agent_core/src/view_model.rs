use crate::{ConnectionState, TaskStatus};

/// Push-channel indicator shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionView {
    Connected,
    #[default]
    Disconnected,
    Reconnecting {
        attempt: u32,
    },
    /// The server announced shutdown; needs a manual reconnect.
    ServerShutdown {
        message: String,
    },
    /// Retries are exhausted; needs a manual reconnect.
    GaveUp {
        message: String,
    },
}

impl ConnectionView {
    pub fn from_state(state: &ConnectionState) -> Self {
        let message = || state.last_error.clone().unwrap_or_default();
        if state.is_connected {
            Self::Connected
        } else if state.is_server_shutting_down {
            Self::ServerShutdown { message: message() }
        } else if state.retries_exhausted {
            Self::GaveUp { message: message() }
        } else if state.attempt_count > 0 {
            Self::Reconnecting {
                attempt: state.attempt_count,
            }
        } else {
            Self::Disconnected
        }
    }

    /// Whether only a manual reconnect can bring the channel back.
    pub fn needs_manual_reconnect(&self) -> bool {
        matches!(self, Self::ServerShutdown { .. } | Self::GaveUp { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub status: TaskStatus,
    pub task_id: Option<String>,
    pub user_message: Option<String>,
    pub reply: Option<String>,
    pub instruction: Option<String>,
    pub thinking: bool,
    pub is_running: bool,
    pub error: Option<String>,
    /// The visible screenshot; lags the latest received one until its preload succeeds.
    pub displayed_screenshot: Option<String>,
    pub screenshot_loading: bool,
    pub connection: ConnectionView,
    pub can_stop: bool,
    pub awaiting_task: bool,
    pub dirty: bool,
}

impl AppViewModel {
    /// Text for the agent side of the conversation.
    pub fn agent_text(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        if let Some(instruction) = &self.instruction {
            return Some(instruction.clone());
        }
        if let Some(reply) = &self.reply {
            return Some(reply.clone());
        }
        if self.task_id.is_some() {
            return Some(format!("Status: {}", self.status));
        }
        None
    }
}

/// Placeholder for the instruction prompt.
pub fn prompt_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Running => "Agent is running...",
        TaskStatus::Init => "Agent is initializing...",
        TaskStatus::MaxLoop => "Agent reached max iterations...",
        TaskStatus::Stopping => "Stopping agent...",
        _ => "Type your instruction...",
    }
}
