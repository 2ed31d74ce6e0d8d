//! Console configuration: built-in defaults, then an optional RON file, then
//! environment overrides.
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_core::ReconnectPolicy;
use agent_engine::{
    parse_url, ConfigError, EngineConfig, GatewaySettings, PollSettings, PushEndpoint,
    DEFAULT_BASE_URL, DEFAULT_WS_PORT,
};
use agent_logging::{agent_info, agent_warn};
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILENAME: &str = "agent_console.ron";
pub(crate) const CONFIG_PATH_ENV: &str = "AGENT_CONSOLE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ClientConfig {
    pub api_base_url: String,
    pub ws_url: Option<String>,
    pub ws_tunnel_host: Option<String>,
    pub api_host: Option<String>,
    pub ws_port: u16,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub reconnect_max_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_factor: f64,
    pub reconnect_max_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            ws_tunnel_host: None,
            api_host: None,
            ws_port: DEFAULT_WS_PORT,
            poll_interval_ms: 2000,
            poll_max_attempts: 900,
            reconnect_max_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_factor: 2.0,
            reconnect_max_delay_ms: 30_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Loads the effective configuration for this process.
    pub(crate) fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILENAME));
        let mut config = Self::from_file(&path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Reads `path`, falling back to defaults when it is missing or malformed.
    pub(crate) fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                agent_warn!("Failed to read config from {:?}: {}", path, err);
                return Self::default();
            }
        };
        match ron::from_str(&content) {
            Ok(config) => {
                agent_info!("Loaded config from {:?}", path);
                config
            }
            Err(err) => {
                agent_warn!("Ignoring malformed config {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(url) = text("AGENT_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = text("AGENT_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Some(host) = text("AGENT_WS_TUNNEL_HOST") {
            self.ws_tunnel_host = Some(host);
        }
        if let Some(host) = text("AGENT_API_HOST") {
            self.api_host = Some(host);
        }
        if let Some(port) = text("AGENT_WS_PORT") {
            match port.parse() {
                Ok(port) => self.ws_port = port,
                Err(err) => agent_warn!("Ignoring AGENT_WS_PORT={:?}: {}", port, err),
            }
        }
        if let Some(interval) = text("AGENT_POLL_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => agent_warn!("Ignoring AGENT_POLL_INTERVAL_MS={:?}", interval),
            }
        }
    }

    pub(crate) fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let base_url = parse_url(&self.api_base_url)?;
        let gateway = GatewaySettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..GatewaySettings::with_base_url(base_url)
        };
        let push = PushEndpoint {
            url: self.ws_url.clone(),
            tunnel_host: self.ws_tunnel_host.clone(),
            host: self.api_host.clone(),
            port: self.ws_port,
        };
        let mut config = EngineConfig::new(gateway, &push)?;
        config.reconnect = ReconnectPolicy {
            max_attempts: self.reconnect_max_attempts.max(1),
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            factor: self.reconnect_factor,
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
        };
        config.poll = PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_attempts: self.poll_max_attempts,
        };
        Ok(config)
    }
}
