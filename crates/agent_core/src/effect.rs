use std::time::Duration;

use crate::{PreloadId, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the push channel (no-op while it is suppressed).
    ConnectChannel,
    /// Clear shutdown/exhaustion state and reconnect the push channel.
    ReconnectChannel,
    /// Ask the backend whether an agent task is already running.
    CheckRunningAgent,
    CreateTask {
        request: RequestId,
        message: String,
    },
    StopTask {
        task_id: String,
    },
    /// Start (or replace) the fallback poller for `task_id`. `None` fields use
    /// the configured defaults.
    StartPoller {
        task_id: String,
        endpoint: Option<String>,
        interval: Option<Duration>,
    },
    StopPoller,
    PreloadScreenshot {
        id: PreloadId,
        url: String,
    },
    CancelPreloads,
}
