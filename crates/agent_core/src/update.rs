use crate::state::STOP_UNREACHABLE_REPLY;
use crate::{AgentStatusUpdate, AppState, Effect, Msg, StopFailure, TaskStatus};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started => vec![Effect::ConnectChannel, Effect::CheckRunningAgent],
        Msg::InstructionSubmitted(raw) => {
            let message = raw.trim();
            if message.is_empty() {
                return (state, Vec::new());
            }

            let mut effects = Vec::new();
            // Stop & send: the previous task is abandoned, its stop result is stale.
            if let Some(previous) = state.active_task_id() {
                if state.task().status.is_active() {
                    effects.push(Effect::StopTask {
                        task_id: previous.to_string(),
                    });
                }
            }
            if state.is_poller_active() {
                effects.push(Effect::StopPoller);
            }
            if state.screenshots().is_loading() {
                effects.push(Effect::CancelPreloads);
            }

            let request = state.begin_submission(message);
            effects.push(Effect::CreateTask {
                request,
                message: message.to_string(),
            });
            effects
        }
        Msg::StopClicked => match state.active_task_id() {
            Some(task_id) if state.task().status.is_active() => {
                let task_id = task_id.to_string();
                state.mark_stopping();
                vec![Effect::StopTask { task_id }]
            }
            _ => Vec::new(),
        },
        Msg::ReconnectClicked => vec![Effect::ReconnectChannel],
        Msg::TaskCreated {
            request,
            task_id,
            polling,
        } => {
            if state.pending_request() != Some(request) {
                return (state, Vec::new());
            }
            state.start_task(task_id, polling);
            start_poller_if_disconnected(&mut state)
        }
        Msg::TaskCreateFailed { request, .. } => {
            if state.pending_request() == Some(request) {
                state.fail_creation();
            }
            Vec::new()
        }
        Msg::StopCompleted { task_id, result } => {
            let is_current = state.active_task_id() == Some(task_id.as_str())
                && state.task().status == TaskStatus::Stopping;
            if !is_current {
                return (state, Vec::new());
            }
            let (status, error) = match result {
                Ok(()) => (TaskStatus::Stopped, None),
                Err(StopFailure::Rejected(reason)) => (
                    TaskStatus::Error,
                    Some(format!("Error stopping task: {reason}")),
                ),
                Err(StopFailure::Unreachable) => {
                    (TaskStatus::Error, Some(STOP_UNREACHABLE_REPLY.to_string()))
                }
            };
            if let Some(error) = error {
                state.set_error(error);
            }
            settle(&mut state, status)
        }
        Msg::StatusReceived(update) => apply_status(&mut state, update),
        Msg::RunningAgentDiscovered(update) => {
            let idle = state.task().status == TaskStatus::Idle
                && state.pending_request().is_none()
                && state.active_task_id().is_none();
            if !idle || update.is_running != Some(true) {
                return (state, Vec::new());
            }
            state.adopt_running(&update);
            let mut effects = Vec::new();
            if let Some(source) = &update.screenshot {
                if let Some(pending) = state.show_screenshot(source.to_data_uri()) {
                    effects.push(Effect::PreloadScreenshot {
                        id: pending.id,
                        url: pending.url,
                    });
                }
            }
            effects.extend(start_poller_if_disconnected(&mut state));
            effects
        }
        Msg::ConnectionChanged(connection) => {
            let connected = connection.is_connected;
            state.set_connection(connection);
            if connected {
                Vec::new()
            } else {
                start_poller_if_disconnected(&mut state)
            }
        }
        Msg::PollerFinished { task_id, .. } => {
            if state.active_task_id() == Some(task_id.as_str()) {
                state.set_poller_active(false);
            }
            Vec::new()
        }
        Msg::PreloadFinished { id, ok } => {
            state.complete_preload(id, ok);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn apply_status(state: &mut AppState, update: AgentStatusUpdate) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut claimed = false;
    match state.active_task_id() {
        Some(active) => {
            if update
                .task_id
                .as_deref()
                .is_some_and(|task_id| task_id != active)
            {
                return effects;
            }
        }
        None if state.is_untracked() => {
            if let Some(task_id) = &update.task_id {
                state.claim_task_id(task_id.clone());
                claimed = true;
            }
        }
        None => return effects,
    }

    state.merge(&update);

    if let Some(source) = &update.screenshot {
        if let Some(pending) = state.show_screenshot(source.to_data_uri()) {
            effects.push(Effect::PreloadScreenshot {
                id: pending.id,
                url: pending.url,
            });
        }
    }

    let status = state.task().status;
    if status.is_terminal() {
        effects.extend(settle(state, status));
    } else if claimed {
        effects.extend(start_poller_if_disconnected(state));
    }
    effects
}

fn settle(state: &mut AppState, status: TaskStatus) -> Vec<Effect> {
    if state.settle(status) {
        vec![Effect::StopPoller]
    } else {
        Vec::new()
    }
}

/// Entering INIT/RUNNING with the push channel down starts the fallback poller.
fn start_poller_if_disconnected(state: &mut AppState) -> Vec<Effect> {
    if state.connection().is_connected || state.is_poller_active() {
        return Vec::new();
    }
    let status = state.task().status;
    if !(status.is_active() || status == TaskStatus::Stopping) {
        return Vec::new();
    }
    let Some(task_id) = state.active_task_id().map(ToOwned::to_owned) else {
        return Vec::new();
    };

    let (endpoint, interval) = match state.polling_hint() {
        Some(hint) => (hint.status_endpoint.clone(), hint.interval),
        None => (None, None),
    };
    state.set_poller_active(true);
    vec![Effect::StartPoller {
        task_id,
        endpoint,
        interval,
    }]
}
