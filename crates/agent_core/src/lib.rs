//! Agent core: pure task lifecycle state machine and view-model helpers.
mod connection;
mod effect;
mod merge;
mod msg;
mod screenshot;
mod state;
mod status;
mod update;
mod view_model;

pub use connection::{CloseOutcome, ConnectionState, ReconnectPolicy};
pub use effect::Effect;
pub use merge::merge_update;
pub use msg::{Msg, PollerExit, PollingHint, RequestId, StopFailure};
pub use screenshot::{PendingPreload, PreloadId, ScreenshotLoader};
pub use state::{AppState, TaskState};
pub use status::{AgentStatusUpdate, ScreenshotSource, TaskStatus};
pub use update::update;
pub use view_model::{prompt_label, AppViewModel, ConnectionView};
