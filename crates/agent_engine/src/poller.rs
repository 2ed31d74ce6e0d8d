use std::sync::Arc;
use std::time::Duration;

use agent_core::PollerExit;
use agent_logging::{agent_debug, agent_info, agent_warn};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{AgentGateway, EngineEvent, EventSink, UpdateSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Total requests a single poller may issue.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 900,
        }
    }
}

struct ActivePoll {
    task_id: String,
    cancel: CancellationToken,
}

/// HTTP fallback for status updates while the push channel is down.
///
/// At most one poll loop runs at a time. Must be used from within a tokio
/// runtime.
pub struct StatusPoller {
    gateway: Arc<dyn AgentGateway>,
    sink: Arc<dyn EventSink>,
    settings: PollSettings,
    current: Option<ActivePoll>,
}

impl StatusPoller {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        sink: Arc<dyn EventSink>,
        settings: PollSettings,
    ) -> Self {
        Self {
            gateway,
            sink,
            settings,
            current: None,
        }
    }

    /// Starts polling `endpoint` for `task_id`, replacing any running poller.
    pub fn start(&mut self, endpoint: Url, interval: Option<Duration>, task_id: String) {
        self.stop();
        let interval = interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(self.settings.interval);
        agent_info!(
            "Polling {} every {:?} for task {}",
            endpoint,
            interval,
            task_id
        );
        let cancel = CancellationToken::new();
        let job = PollJob {
            gateway: self.gateway.clone(),
            sink: self.sink.clone(),
            endpoint,
            interval,
            max_attempts: self.settings.max_attempts,
            task_id: task_id.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(job.run());
        self.current = Some(ActivePoll { task_id, cancel });
    }

    pub fn stop(&mut self) {
        if let Some(active) = self.current.take() {
            agent_debug!("Stopping poller for task {}", active.task_id);
            active.cancel.cancel();
        }
    }

    pub fn active_task(&self) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|active| !active.cancel.is_cancelled())
            .map(|active| active.task_id.as_str())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollJob {
    gateway: Arc<dyn AgentGateway>,
    sink: Arc<dyn EventSink>,
    endpoint: Url,
    interval: Duration,
    max_attempts: u32,
    task_id: String,
    cancel: CancellationToken,
}

impl PollJob {
    async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if attempts >= self.max_attempts {
                agent_warn!(
                    "Giving up polling task {} after {} requests",
                    self.task_id,
                    attempts
                );
                self.finish(PollerExit::AttemptsExhausted);
                return;
            }
            attempts += 1;

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.gateway.fetch_status(&self.endpoint) => result,
            };
            match result {
                Ok(mut update) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    if update.task_id.is_none() {
                        update.task_id = Some(self.task_id.clone());
                    }
                    let keep_polling = update.keeps_polling();
                    self.sink.emit(EngineEvent::Status {
                        source: UpdateSource::Poll,
                        update,
                    });
                    if !keep_polling {
                        agent_info!("Task {} settled; poller done", self.task_id);
                        self.finish(PollerExit::Settled);
                        return;
                    }
                }
                Err(err) => {
                    agent_warn!(
                        "Status poll {} for task {} failed: {}",
                        attempts,
                        self.task_id,
                        err
                    );
                }
            }
        }
    }

    fn finish(&self, exit: PollerExit) {
        self.cancel.cancel();
        self.sink.emit(EngineEvent::PollerFinished {
            task_id: self.task_id.clone(),
            exit,
        });
    }
}
