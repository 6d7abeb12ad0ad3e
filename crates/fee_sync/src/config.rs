use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::types::UnlockingField;

pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 1_800_000;
pub const DEFAULT_PUSH_PATH: &str = "/websockets/crosschain/unsignedfees";
pub const DEFAULT_SERVICE_KIND: &str = "ARBITRARY_DATA";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeSyncConfig {
    #[serde(default = "default_node_url")]
    pub node_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub account_address: Option<String>,
    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub unlocking_field: UnlockingField,
    #[serde(default = "default_service_kind")]
    pub service_kind: String,
}

impl Default for FeeSyncConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            api_key: None,
            account_address: None,
            gateway_timeout_ms: default_gateway_timeout_ms(),
            heartbeat: HeartbeatConfig::default(),
            unlocking_field: UnlockingField::default(),
            service_kind: default_service_kind(),
        }
    }
}

fn default_node_url() -> String {
    "http://127.0.0.1:12391".to_string()
}

fn default_gateway_timeout_ms() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_MS
}

fn default_service_kind() -> String {
    DEFAULT_SERVICE_KIND.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_push_path")]
    pub path: String,
    #[serde(default = "default_initial_probe_ms")]
    pub initial_probe_ms: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            path: default_push_path(),
            initial_probe_ms: default_initial_probe_ms(),
            probe_interval_ms: default_probe_interval_ms(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl HeartbeatConfig {
    pub fn initial_probe(&self) -> Duration {
        Duration::from_millis(self.initial_probe_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

fn default_push_path() -> String {
    DEFAULT_PUSH_PATH.to_string()
}

fn default_initial_probe_ms() -> u64 {
    50
}

fn default_probe_interval_ms() -> u64 {
    295_000
}

/// What the heartbeat channel does after the connection drops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReconnectPolicy {
    Never,
    Backoff {
        #[serde(default = "default_backoff_initial_ms")]
        initial_ms: u64,
        #[serde(default = "default_backoff_max_ms")]
        max_ms: u64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Backoff {
            initial_ms: default_backoff_initial_ms(),
            max_ms: default_backoff_max_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero based), or `None`
    /// when the channel should stay closed.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff { initial_ms, max_ms } => {
                let mut delay = Duration::from_millis(*initial_ms);
                let max = Duration::from_millis(*max_ms);
                for _ in 0..attempt {
                    delay = (delay + delay).min(max);
                    if delay == max {
                        break;
                    }
                }
                Some(delay.min(max))
            }
        }
    }
}

fn default_backoff_initial_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

impl FeeSyncConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Load `path` when it exists, otherwise start from defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("FEE_SYNC_NODE_URL") {
            self.node_url = url;
        }
        if let Ok(key) = std::env::var("FEE_SYNC_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(address) = std::env::var("FEE_SYNC_ADDRESS") {
            self.account_address = Some(address);
        }
        if let Ok(raw) = std::env::var("FEE_SYNC_TIMEOUT_MS") {
            self.gateway_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "FEE_SYNC_TIMEOUT_MS",
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn node_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.node_url).map_err(|err| ConfigError::InvalidUrl {
            url: self.node_url.clone(),
            reason: err.to_string(),
        })
    }

    /// Push endpoint on the same node, with the scheme switched to websocket.
    pub fn push_url(&self) -> Result<Url, ConfigError> {
        let base = self.node_url()?;
        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConfigError::InvalidUrl {
                    url: self.node_url.clone(),
                    reason: format!("unsupported scheme: {other}"),
                })
            }
        };
        let mut url = base.join(&self.heartbeat.path).map_err(|err| ConfigError::InvalidUrl {
            url: self.node_url.clone(),
            reason: err.to_string(),
        })?;
        url.set_scheme(scheme).map_err(|_| ConfigError::InvalidUrl {
            url: self.node_url.clone(),
            reason: format!("cannot switch scheme to {scheme}"),
        })?;
        Ok(url)
    }
}
