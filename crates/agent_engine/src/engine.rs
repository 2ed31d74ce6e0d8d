use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use agent_core::{PollerExit, PreloadId, RequestId};
use agent_logging::{agent_debug, agent_error, agent_warn};

use crate::channel::{StatusChannel, TungsteniteConnector};
use crate::config::EngineConfig;
use crate::gateway::{AgentGateway, GatewaySettings, ReqwestGateway};
use crate::poller::StatusPoller;
use crate::preload::ImagePreloader;
use crate::sink::{ChannelEventSink, EventSink};
use crate::{EngineEvent, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Gateway(#[from] GatewayError),
}

enum EngineCommand {
    ConnectChannel,
    ReconnectChannel,
    CheckRunning,
    CreateTask {
        request: RequestId,
        message: String,
    },
    StopTask {
        task_id: String,
    },
    StartPoller {
        task_id: String,
        endpoint: Option<String>,
        interval: Option<Duration>,
    },
    StopPoller,
    Preload {
        id: PreloadId,
        url: String,
    },
    CancelPreloads,
}

/// Front of the I/O engine: commands go in, [`EngineEvent`]s come out.
///
/// All network work runs on a tokio runtime owned by a background thread.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("agent-engine")
            .build()?;
        let gateway = ReqwestGateway::new(config.gateway.clone())?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let _guard = runtime.enter();
            let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
            let mut worker = EngineWorker::new(config, gateway, sink);
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            agent_debug!("Engine command channel closed");
            worker.shutdown();
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn connect_channel(&self) {
        self.send(EngineCommand::ConnectChannel);
    }

    pub fn reconnect_channel(&self) {
        self.send(EngineCommand::ReconnectChannel);
    }

    pub fn check_running(&self) {
        self.send(EngineCommand::CheckRunning);
    }

    pub fn create_task(&self, request: RequestId, message: impl Into<String>) {
        self.send(EngineCommand::CreateTask {
            request,
            message: message.into(),
        });
    }

    pub fn stop_task(&self, task_id: impl Into<String>) {
        self.send(EngineCommand::StopTask {
            task_id: task_id.into(),
        });
    }

    pub fn start_poller(
        &self,
        task_id: impl Into<String>,
        endpoint: Option<String>,
        interval: Option<Duration>,
    ) {
        self.send(EngineCommand::StartPoller {
            task_id: task_id.into(),
            endpoint,
            interval,
        });
    }

    pub fn stop_poller(&self) {
        self.send(EngineCommand::StopPoller);
    }

    pub fn preload(&self, id: PreloadId, url: impl Into<String>) {
        self.send(EngineCommand::Preload {
            id,
            url: url.into(),
        });
    }

    pub fn cancel_preloads(&self) {
        self.send(EngineCommand::CancelPreloads);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            agent_error!("Engine thread is gone; command dropped");
        }
    }
}

struct EngineWorker {
    settings: GatewaySettings,
    gateway: Arc<dyn AgentGateway>,
    sink: Arc<dyn EventSink>,
    channel: StatusChannel,
    poller: StatusPoller,
    preloader: ImagePreloader,
}

impl EngineWorker {
    /// Must run inside the runtime context; the channel worker is spawned here.
    fn new(config: EngineConfig, gateway: ReqwestGateway, sink: Arc<dyn EventSink>) -> Self {
        let settings = gateway.settings().clone();
        let preloader = ImagePreloader::new(gateway.client().clone(), sink.clone());
        let gateway: Arc<dyn AgentGateway> = Arc::new(gateway);
        let channel = StatusChannel::spawn(
            config.push_url,
            config.reconnect,
            Arc::new(TungsteniteConnector::new(settings.connect_timeout)),
            sink.clone(),
        );
        let poller = StatusPoller::new(gateway.clone(), sink.clone(), config.poll);
        Self {
            settings,
            gateway,
            sink,
            channel,
            poller,
            preloader,
        }
    }

    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::ConnectChannel => self.channel.connect(),
            EngineCommand::ReconnectChannel => self.channel.reconnect(),
            EngineCommand::CheckRunning => {
                let gateway = self.gateway.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = gateway.check_running().await;
                    if let Err(err) = &result {
                        agent_warn!("Running-agent check failed: {}", err);
                    }
                    sink.emit(EngineEvent::RunningAgent(result));
                });
            }
            EngineCommand::CreateTask { request, message } => {
                let gateway = self.gateway.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = gateway.create_task(&message).await;
                    if let Err(err) = &result {
                        agent_error!("Creating task failed: {}", err);
                    }
                    sink.emit(EngineEvent::TaskCreated { request, result });
                });
            }
            EngineCommand::StopTask { task_id } => {
                let gateway = self.gateway.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = gateway.stop_task(&task_id).await;
                    if let Err(err) = &result {
                        agent_error!("Stopping task {} failed: {}", task_id, err);
                    }
                    sink.emit(EngineEvent::TaskStopped { task_id, result });
                });
            }
            EngineCommand::StartPoller {
                task_id,
                endpoint,
                interval,
            } => {
                let resolved = match endpoint.as_deref() {
                    Some(endpoint) => self.settings.resolve(endpoint).or_else(|err| {
                        agent_warn!("Ignoring status endpoint hint: {}", err);
                        self.settings.status_url(&task_id)
                    }),
                    None => self.settings.status_url(&task_id),
                };
                match resolved {
                    Ok(url) => self.poller.start(url, interval, task_id),
                    Err(err) => {
                        agent_error!("Cannot poll task {}: {}", task_id, err);
                        self.sink.emit(EngineEvent::PollerFinished {
                            task_id,
                            exit: PollerExit::AttemptsExhausted,
                        });
                    }
                }
            }
            EngineCommand::StopPoller => self.poller.stop(),
            EngineCommand::Preload { id, url } => self.preloader.preload(id, url),
            EngineCommand::CancelPreloads => self.preloader.cancel_all(),
        }
    }

    fn shutdown(&mut self) {
        self.poller.stop();
        self.preloader.cancel_all();
        self.channel.close();
    }
}
