//! JSON shapes exchanged with the agent backend.
//!
//! Parsing is lenient: fields the client does not understand are skipped,
//! loosely typed values (`thinking: ""`, `isRunning: "true"`, a numeric
//! `timestamp`) are coerced, and a status field of an unexpected shape is
//! dropped rather than failing the whole frame.
use std::time::Duration;

use agent_core::{AgentStatusUpdate, PollingHint, ScreenshotSource, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame received on the push channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum PushFrame {
    #[serde(rename = "agentStatus")]
    AgentStatus(StatusPayload),
    #[serde(rename = "serverStatus")]
    ServerStatus(ServerStatusPayload),
    #[serde(other)]
    Unknown,
}

pub(crate) fn parse_push_frame(text: &str) -> Result<PushFrame, serde_json::Error> {
    serde_json::from_str(text)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServerStatusPayload {
    pub status: Option<String>,
    pub message: Option<String>,
}

impl ServerStatusPayload {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("SHUTDOWN"))
    }
}

/// Status fields shared by push frames, poll responses and the running check.
///
/// Poll responses nest the task fields under `taskStatus`; push frames carry
/// them flat. Flat fields win when both are present.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct StatusPayload {
    task_id: Option<Value>,
    status: Option<Value>,
    is_running: Option<Value>,
    thinking: Option<Value>,
    instruction: Option<Value>,
    instructions: Option<Value>,
    screenshot: Option<Value>,
    timestamp: Option<Value>,
    task_status: Option<Value>,
}

impl StatusPayload {
    pub(crate) fn into_update(self) -> AgentStatusUpdate {
        let nested = self
            .task_status
            .and_then(|nested| serde_json::from_value::<StatusPayload>(nested).ok())
            .map(StatusPayload::into_update)
            .unwrap_or_default();

        let label = self.status.as_ref().and_then(Value::as_str).map(str::trim);
        let thinking_label = label.is_some_and(|label| label.eq_ignore_ascii_case("THINKING"));
        let status = label.and_then(TaskStatus::from_label);
        let thinking = self
            .thinking
            .as_ref()
            .and_then(flag)
            .or(thinking_label.then_some(true));

        AgentStatusUpdate {
            task_id: self.task_id.as_ref().and_then(identifier).or(nested.task_id),
            status: status.or(nested.status),
            is_running: self.is_running.as_ref().and_then(flag).or(nested.is_running),
            thinking: thinking.or(nested.thinking),
            instruction: self
                .instruction
                .as_ref()
                .and_then(text)
                .or_else(|| self.instructions.as_ref().and_then(text))
                .or(nested.instruction),
            screenshot: self
                .screenshot
                .and_then(|value| serde_json::from_value::<ScreenshotPayload>(value).ok())
                .and_then(ScreenshotPayload::into_source)
                .or(nested.screenshot),
            timestamp: self.timestamp.as_ref().and_then(text).or(nested.timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScreenshotPayload {
    Encoded {
        format: Option<String>,
        base64: String,
    },
    DataUrl {
        #[serde(rename = "dataUrl")]
        data_url: Option<String>,
    },
    Raw(String),
}

impl ScreenshotPayload {
    fn into_source(self) -> Option<ScreenshotSource> {
        let source = match self {
            Self::Encoded { format, base64 } if !base64.trim().is_empty() => {
                ScreenshotSource::Encoded {
                    format: format.unwrap_or_default(),
                    base64,
                }
            }
            Self::DataUrl {
                data_url: Some(url),
            }
            | Self::Raw(url)
                if !url.trim().is_empty() =>
            {
                ScreenshotSource::DataUri(url)
            }
            _ => return None,
        };
        Some(source)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTaskRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StopTaskRequest<'a> {
    pub task_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CreateTaskResponse {
    task_id: Option<Value>,
    #[serde(rename = "_polling")]
    polling: Option<PollingPayload>,
}

impl CreateTaskResponse {
    pub(crate) fn task_id(&self) -> Option<String> {
        self.task_id.as_ref().and_then(identifier)
    }

    pub(crate) fn polling_hint(&self) -> Option<PollingHint> {
        self.polling.as_ref().map(|polling| PollingHint {
            status_endpoint: polling.status_endpoint.clone(),
            interval: polling
                .polling_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PollingPayload {
    status_endpoint: Option<String>,
    polling_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StopTaskResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Extracts the `error` (or `details`) text from an error body, if any.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "details", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" => Some(false),
            _ => Some(true),
        },
        _ => None,
    }
}

/// Free text; numbers are rendered, other shapes are dropped.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
