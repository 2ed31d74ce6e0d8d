use crate::merge::merge_update;
use crate::view_model::{AppViewModel, ConnectionView};
use crate::{
    AgentStatusUpdate, ConnectionState, PendingPreload, PollingHint, PreloadId, RequestId,
    ScreenshotLoader, TaskStatus,
};

pub(crate) const PROCESSING_REPLY: &str = "Processing...";
pub(crate) const CREATE_FAILED_REPLY: &str = "Sorry, there was an error processing your request.";
pub(crate) const STOP_UNREACHABLE_REPLY: &str =
    "Network error while stopping task. Please try again.";

/// The client's view of the single active task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskState {
    pub task_id: Option<String>,
    pub status: TaskStatus,
    pub instruction: Option<String>,
    pub thinking: bool,
    pub is_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    task: TaskState,
    /// Gate for incoming updates; cleared when the task settles.
    active_task_id: Option<String>,
    /// A running agent was adopted without a task id; untagged updates apply
    /// to it until one names the id.
    untracked_task: bool,
    screenshots: ScreenshotLoader,
    connection: ConnectionState,
    user_message: Option<String>,
    reply: Option<String>,
    error: Option<String>,
    pending_request: Option<RequestId>,
    next_request: RequestId,
    polling_hint: Option<PollingHint>,
    poller_active: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self) -> &TaskState {
        &self.task
    }

    pub fn active_task_id(&self) -> Option<&str> {
        self.active_task_id.as_deref()
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn screenshots(&self) -> &ScreenshotLoader {
        &self.screenshots
    }

    pub fn is_poller_active(&self) -> bool {
        self.poller_active
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending_request
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            status: self.task.status,
            task_id: self.task.task_id.clone(),
            user_message: self.user_message.clone(),
            reply: self.reply.clone(),
            instruction: self.task.instruction.clone(),
            thinking: self.task.thinking,
            is_running: self.task.is_running,
            error: self.error.clone(),
            displayed_screenshot: self.screenshots.displayed().map(ToOwned::to_owned),
            screenshot_loading: self.screenshots.is_loading(),
            connection: ConnectionView::from_state(&self.connection),
            can_stop: self.task.status.is_active() && self.active_task_id.is_some(),
            awaiting_task: self.pending_request.is_some(),
            dirty: self.dirty,
        }
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_untracked(&self) -> bool {
        self.untracked_task
    }

    pub(crate) fn polling_hint(&self) -> Option<&PollingHint> {
        self.polling_hint.as_ref()
    }

    /// Resets everything task-related for a new instruction and returns the
    /// request id for the create call.
    pub(crate) fn begin_submission(&mut self, message: &str) -> RequestId {
        self.task = TaskState::default();
        self.active_task_id = None;
        self.untracked_task = false;
        self.screenshots.reset();
        self.user_message = Some(message.to_string());
        self.reply = None;
        self.error = None;
        self.polling_hint = None;
        self.poller_active = false;
        self.next_request += 1;
        self.pending_request = Some(self.next_request);
        self.dirty = true;
        self.next_request
    }

    pub(crate) fn start_task(&mut self, task_id: String, polling: Option<PollingHint>) {
        self.pending_request = None;
        self.task.task_id = Some(task_id.clone());
        self.task.status = TaskStatus::Init;
        self.task.is_running = true;
        self.active_task_id = Some(task_id);
        self.polling_hint = polling;
        self.reply = Some(PROCESSING_REPLY.to_string());
        self.dirty = true;
    }

    pub(crate) fn fail_creation(&mut self) {
        self.pending_request = None;
        self.task.status = TaskStatus::Error;
        self.task.is_running = false;
        self.error = Some(CREATE_FAILED_REPLY.to_string());
        self.dirty = true;
    }

    /// Adopts a task discovered at start-up.
    pub(crate) fn adopt_running(&mut self, update: &AgentStatusUpdate) {
        let status = match update.status {
            Some(status) if status.is_active() => status,
            _ => TaskStatus::Running,
        };
        self.task = TaskState {
            task_id: update.task_id.clone(),
            status,
            instruction: None,
            thinking: false,
            is_running: true,
        };
        self.active_task_id = update.task_id.clone();
        self.untracked_task = update.task_id.is_none();
        let status_only = AgentStatusUpdate {
            status: None,
            ..update.clone()
        };
        merge_update(&mut self.task, &status_only);
        if self.task.instruction.is_none() {
            self.reply = Some(format!("Agent is currently running with status: {status}"));
        }
        self.dirty = true;
    }

    /// Binds the adopted task to the first id an update reports for it.
    pub(crate) fn claim_task_id(&mut self, task_id: String) {
        self.task.task_id = Some(task_id.clone());
        self.active_task_id = Some(task_id);
        self.untracked_task = false;
        self.dirty = true;
    }

    pub(crate) fn mark_stopping(&mut self) {
        self.task.status = TaskStatus::Stopping;
        self.dirty = true;
    }

    /// Applies a merge; returns true when any field changed.
    pub(crate) fn merge(&mut self, update: &AgentStatusUpdate) -> bool {
        let changed = merge_update(&mut self.task, update);
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Moves the task into a terminal status and drops the active reference.
    /// Returns true when a poller was running for it.
    pub(crate) fn settle(&mut self, status: TaskStatus) -> bool {
        debug_assert!(status.is_terminal());
        self.task.status = status;
        self.task.is_running = false;
        self.active_task_id = None;
        self.untracked_task = false;
        self.dirty = true;
        std::mem::take(&mut self.poller_active)
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
        self.dirty = true;
    }

    pub(crate) fn set_poller_active(&mut self, active: bool) {
        self.poller_active = active;
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection;
            self.dirty = true;
        }
    }

    pub(crate) fn show_screenshot(&mut self, url: String) -> Option<PendingPreload> {
        let before = self.screenshots.loading_url().map(ToOwned::to_owned);
        let request = self.screenshots.show(url);
        if self.screenshots.loading_url() != before.as_deref() {
            self.dirty = true;
        }
        request
    }

    pub(crate) fn complete_preload(&mut self, id: PreloadId, ok: bool) {
        if self.screenshots.complete(id, ok) {
            self.dirty = true;
        }
    }
}
