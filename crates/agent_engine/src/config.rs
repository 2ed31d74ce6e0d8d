use agent_core::ReconnectPolicy;
use url::Url;

use crate::gateway::GatewaySettings;
use crate::poller::PollSettings;

pub const DEFAULT_WS_PORT: u16 = 3334;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid url {value:?}: {message}")]
    InvalidUrl { value: String, message: String },
    #[error("no host to derive the push endpoint from")]
    MissingHost,
}

/// Inputs for locating the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEndpoint {
    /// Full `ws://`/`wss://` URL; wins over everything else.
    pub url: Option<String>,
    /// Tunnel host; the channel is served at `wss://{host}/ws`.
    pub tunnel_host: Option<String>,
    /// API host override; falls back to the base URL's host.
    pub host: Option<String>,
    pub port: u16,
}

impl Default for PushEndpoint {
    fn default() -> Self {
        Self {
            url: None,
            tunnel_host: None,
            host: None,
            port: DEFAULT_WS_PORT,
        }
    }
}

impl PushEndpoint {
    pub fn resolve(&self, base_url: &Url) -> Result<Url, ConfigError> {
        if let Some(explicit) = non_empty(self.url.as_deref()) {
            return parse_url(explicit);
        }
        if let Some(tunnel) = non_empty(self.tunnel_host.as_deref()) {
            let host = tunnel
                .trim_start_matches("https://")
                .trim_start_matches("wss://")
                .trim_end_matches('/');
            return parse_url(&format!("wss://{host}/ws"));
        }
        let host = non_empty(self.host.as_deref())
            .or_else(|| base_url.host_str())
            .ok_or(ConfigError::MissingHost)?;
        let scheme = if base_url.scheme() == "https" { "wss" } else { "ws" };
        parse_url(&format!("{scheme}://{host}:{}", self.port))
    }
}

/// Everything the engine needs to talk to one backend.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gateway: GatewaySettings,
    pub push_url: Url,
    pub reconnect: ReconnectPolicy,
    pub poll: PollSettings,
}

impl EngineConfig {
    pub fn new(gateway: GatewaySettings, push: &PushEndpoint) -> Result<Self, ConfigError> {
        let push_url = push.resolve(&gateway.base_url)?;
        Ok(Self {
            gateway,
            push_url,
            reconnect: ReconnectPolicy::default(),
            poll: PollSettings::default(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        value: value.to_string(),
        message: err.to_string(),
    })
}
