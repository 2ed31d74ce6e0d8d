use agent_core::{Effect, Msg, StopFailure};
use agent_engine::{EngineConfig, EngineError, EngineEvent, EngineHandle, FailureKind};
use agent_logging::{agent_debug, agent_info, agent_warn};

/// Executes core effects on the engine and turns engine events back into messages.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub(crate) fn new(config: EngineConfig) -> Result<Self, EngineError> {
        agent_info!(
            "Engine targets {} (push {})",
            config.gateway.base_url,
            config.push_url
        );
        Ok(Self {
            engine: EngineHandle::new(config)?,
        })
    }

    pub(crate) fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            agent_debug!("Effect {:?}", effect);
            match effect {
                Effect::ConnectChannel => self.engine.connect_channel(),
                Effect::ReconnectChannel => self.engine.reconnect_channel(),
                Effect::CheckRunningAgent => self.engine.check_running(),
                Effect::CreateTask { request, message } => {
                    self.engine.create_task(request, message)
                }
                Effect::StopTask { task_id } => self.engine.stop_task(task_id),
                Effect::StartPoller {
                    task_id,
                    endpoint,
                    interval,
                } => self.engine.start_poller(task_id, endpoint, interval),
                Effect::StopPoller => self.engine.stop_poller(),
                Effect::PreloadScreenshot { id, url } => self.engine.preload(id, url),
                Effect::CancelPreloads => self.engine.cancel_preloads(),
            }
        }
    }

    /// Drains pending engine events as core messages.
    pub(crate) fn drain(&self) -> Vec<Msg> {
        let mut inbox = Vec::new();
        while let Some(event) = self.engine.try_recv() {
            if let Some(msg) = map_event(event) {
                inbox.push(msg);
            }
        }
        inbox
    }
}

pub(crate) fn map_event(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::Connection(state) => Msg::ConnectionChanged(state),
        EngineEvent::Status { update, .. } => Msg::StatusReceived(update),
        EngineEvent::TaskCreated { request, result } => match result {
            Ok(created) => Msg::TaskCreated {
                request,
                task_id: created.task_id,
                polling: created.polling,
            },
            Err(err) => Msg::TaskCreateFailed {
                request,
                message: err.to_string(),
            },
        },
        EngineEvent::TaskStopped { task_id, result } => Msg::StopCompleted {
            task_id,
            result: result.map(|_| ()).map_err(|err| match err.kind {
                FailureKind::Network | FailureKind::Timeout => StopFailure::Unreachable,
                _ => StopFailure::Rejected(err.message),
            }),
        },
        EngineEvent::RunningAgent(Ok(update)) => Msg::RunningAgentDiscovered(update),
        EngineEvent::RunningAgent(Err(err)) => {
            agent_warn!("Could not check for a running agent: {}", err);
            return None;
        }
        EngineEvent::PollerFinished { task_id, exit } => Msg::PollerFinished { task_id, exit },
        EngineEvent::PreloadFinished { id, result } => Msg::PreloadFinished {
            id,
            ok: result.is_ok(),
        },
    };
    Some(msg)
}
