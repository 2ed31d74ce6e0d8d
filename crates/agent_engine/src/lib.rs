//! Agent engine: backend I/O (HTTP gateway, push channel, poller, screenshot
//! preloading) behind a command/event handle.
mod channel;
mod config;
mod engine;
mod gateway;
mod poller;
mod preload;
mod sink;
mod types;
mod wire;

pub use channel::{ChannelError, Connector, FrameStream, StatusChannel, TungsteniteConnector};
pub use config::{parse_url, ConfigError, EngineConfig, PushEndpoint, DEFAULT_WS_PORT};
pub use engine::{EngineError, EngineHandle};
pub use gateway::{
    AgentGateway, GatewaySettings, ReqwestGateway, DEFAULT_BASE_URL, TASK_ID_PLACEHOLDER,
};
pub use poller::{PollSettings, StatusPoller};
pub use preload::{decode_data_uri, decode_image, DecodedImage, ImagePreloader, PreloadError};
pub use sink::{ChannelEventSink, EventSink};
pub use types::{
    CreatedTask, EngineEvent, FailureKind, GatewayError, StopReceipt, UpdateSource,
};
