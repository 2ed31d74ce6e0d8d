use std::fmt;

/// Lifecycle status of the active task as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Idle,
    Init,
    Running,
    MaxLoop,
    Stopping,
    Stopped,
    End,
    Error,
}

impl TaskStatus {
    /// Parses a backend status label. Labels are case-insensitive; `THINKING`
    /// is reported by some backends as a running sub-state.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_uppercase();
        let status = match normalized.as_str() {
            "IDLE" => Self::Idle,
            "INIT" => Self::Init,
            "RUNNING" | "THINKING" => Self::Running,
            "MAX_LOOP" => Self::MaxLoop,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "END" => Self::End,
            "ERROR" => Self::Error,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::MaxLoop => "MAX_LOOP",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::End => "END",
            Self::Error => "ERROR",
        }
    }

    /// No further updates are expected once a task reaches a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::End | Self::Error)
    }

    /// States the user can stop.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Init | Self::Running | Self::MaxLoop)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screenshot payload as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotSource {
    /// A ready-made data URI (or plain image URL).
    DataUri(String),
    /// Raw base64 image bytes plus the image format (`jpeg`, `png`, ...).
    Encoded { format: String, base64: String },
}

impl ScreenshotSource {
    /// Canonical URL for the screenshot: `data:image/{format};base64,{base64}`
    /// for encoded payloads, the given URI otherwise.
    pub fn to_data_uri(&self) -> String {
        match self {
            Self::DataUri(uri) => uri.trim().to_string(),
            Self::Encoded { format, base64 } => {
                let format = format.trim().to_ascii_lowercase();
                let format = format.strip_prefix("image/").unwrap_or(&format);
                let format = if format.is_empty() { "jpeg" } else { format };
                format!("data:image/{format};base64,{}", base64.trim())
            }
        }
    }
}

/// A status snapshot pushed over the live channel or returned by a poll.
///
/// Every field is optional: an update only carries what the backend sent, and
/// the merge step must not treat a missing field as a cleared one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentStatusUpdate {
    pub task_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub is_running: Option<bool>,
    pub thinking: Option<bool>,
    pub instruction: Option<String>,
    pub screenshot: Option<ScreenshotSource>,
    pub timestamp: Option<String>,
}

impl AgentStatusUpdate {
    /// Whether a poller that received this update should issue another request.
    pub fn keeps_polling(&self) -> bool {
        if self.status.is_some_and(TaskStatus::is_terminal) {
            return false;
        }
        if self.is_running == Some(true) || self.thinking == Some(true) {
            return true;
        }
        match self.status {
            Some(TaskStatus::Init | TaskStatus::Running | TaskStatus::MaxLoop) => true,
            Some(TaskStatus::Stopping) => true,
            Some(_) => false,
            // Nothing usable in the response: treat it as a miss.
            None => self.is_running.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(TaskStatus::from_label("end"), Some(TaskStatus::End));
        assert_eq!(TaskStatus::from_label(" Max_Loop "), Some(TaskStatus::MaxLoop));
        assert_eq!(TaskStatus::from_label("THINKING"), Some(TaskStatus::Running));
        assert_eq!(TaskStatus::from_label("paused"), None);
    }

    #[test]
    fn encoded_screenshot_becomes_data_uri() {
        let source = ScreenshotSource::Encoded {
            format: "JPEG".to_string(),
            base64: "AAAA".to_string(),
        };
        assert_eq!(source.to_data_uri(), "data:image/jpeg;base64,AAAA");

        let prefixed = ScreenshotSource::Encoded {
            format: "image/png".to_string(),
            base64: "BBBB".to_string(),
        };
        assert_eq!(prefixed.to_data_uri(), "data:image/png;base64,BBBB");
    }

    #[test]
    fn polling_stops_on_terminal_status_even_if_running() {
        let update = AgentStatusUpdate {
            status: Some(TaskStatus::End),
            is_running: Some(true),
            ..AgentStatusUpdate::default()
        };
        assert!(!update.keeps_polling());
    }

    #[test]
    fn polling_continues_for_non_terminal_or_running() {
        let running = AgentStatusUpdate {
            status: Some(TaskStatus::MaxLoop),
            is_running: Some(false),
            ..AgentStatusUpdate::default()
        };
        assert!(running.keeps_polling());

        let idle_but_running = AgentStatusUpdate {
            status: Some(TaskStatus::Idle),
            is_running: Some(true),
            ..AgentStatusUpdate::default()
        };
        assert!(idle_but_running.keeps_polling());

        let idle = AgentStatusUpdate {
            status: Some(TaskStatus::Idle),
            is_running: Some(false),
            ..AgentStatusUpdate::default()
        };
        assert!(!idle.keeps_polling());
    }
}
