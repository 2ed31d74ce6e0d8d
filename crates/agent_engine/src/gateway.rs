use std::time::Duration;

use agent_core::AgentStatusUpdate;
use serde::de::DeserializeOwned;
use url::Url;

use crate::wire::{
    self, CreateTaskRequest, CreateTaskResponse, StatusPayload, StopTaskRequest, StopTaskResponse,
};
use crate::{CreatedTask, FailureKind, GatewayError, StopReceipt};

/// Placeholder substituted in [`GatewaySettings::status_path`].
pub const TASK_ID_PLACEHOLDER: &str = "{taskId}";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: Url,
    pub create_path: String,
    pub stop_path: String,
    /// Status route; `{taskId}` is replaced by the task id.
    pub status_path: String,
    pub running_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url parses"),
            create_path: "/api/runAgent".to_string(),
            stop_path: "/api/stopAgent".to_string(),
            status_path: format!("/api/task-status/{TASK_ID_PLACEHOLDER}"),
            running_path: "/api/checkAgent".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewaySettings {
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Resolves a path or absolute URL against the base URL.
    pub fn resolve(&self, endpoint: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(endpoint.trim())
            .map_err(|err| GatewayError::new(FailureKind::InvalidUrl, format!("{endpoint}: {err}")))
    }

    pub fn status_url(&self, task_id: &str) -> Result<Url, GatewayError> {
        let path = self.status_path.replace(TASK_ID_PLACEHOLDER, task_id);
        self.resolve(&path)
    }
}

/// HTTP operations against the agent backend.
#[async_trait::async_trait]
pub trait AgentGateway: Send + Sync {
    async fn create_task(&self, message: &str) -> Result<CreatedTask, GatewayError>;

    async fn stop_task(&self, task_id: &str) -> Result<StopReceipt, GatewayError>;

    async fn fetch_status(&self, endpoint: &Url) -> Result<AgentStatusUpdate, GatewayError>;

    /// Asks whether an agent is already running, e.g. after a restart.
    async fn check_running(&self) -> Result<AgentStatusUpdate, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGateway {
    settings: GatewaySettings,
    client: reqwest::Client,
}

impl ReqwestGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| GatewayError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            let message = wire::error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(GatewayError::new(
                FailureKind::HttpStatus(status.as_u16()),
                message,
            ));
        }
        serde_json::from_str(&body)
            .map_err(|err| GatewayError::new(FailureKind::InvalidResponse, err.to_string()))
    }
}

#[async_trait::async_trait]
impl AgentGateway for ReqwestGateway {
    async fn create_task(&self, message: &str) -> Result<CreatedTask, GatewayError> {
        let url = self.settings.resolve(&self.settings.create_path)?;
        let response: CreateTaskResponse = self
            .read_json(self.client.post(url).json(&CreateTaskRequest { message }))
            .await?;
        let task_id = response.task_id().ok_or_else(|| {
            GatewayError::new(FailureKind::MissingTaskId, "create response carried no taskId")
        })?;
        Ok(CreatedTask {
            task_id,
            polling: response.polling_hint(),
        })
    }

    async fn stop_task(&self, task_id: &str) -> Result<StopReceipt, GatewayError> {
        let url = self.settings.resolve(&self.settings.stop_path)?;
        let response: StopTaskResponse = self
            .read_json(self.client.post(url).json(&StopTaskRequest { task_id }))
            .await?;
        if let Some(error) = response.error {
            return Err(GatewayError::new(FailureKind::InvalidResponse, error));
        }
        Ok(StopReceipt {
            status: response.status,
            message: response.message,
        })
    }

    async fn fetch_status(&self, endpoint: &Url) -> Result<AgentStatusUpdate, GatewayError> {
        let payload: StatusPayload = self.read_json(self.client.get(endpoint.clone())).await?;
        Ok(payload.into_update())
    }

    async fn check_running(&self) -> Result<AgentStatusUpdate, GatewayError> {
        let url = self.settings.resolve(&self.settings.running_path)?;
        let payload: StatusPayload = self.read_json(self.client.get(url)).await?;
        Ok(payload.into_update())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        return GatewayError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return GatewayError::new(FailureKind::InvalidResponse, err.to_string());
    }
    GatewayError::new(FailureKind::Network, err.to_string())
}
