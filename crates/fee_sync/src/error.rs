use std::time::Duration;

use thiserror::Error;

/// Failure reported by a collaborator before the gateway classifies it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote rejected request: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{op} timed out after {}ms", .after.as_millis())]
    Timeout { op: &'static str, after: Duration },
    #[error("{op} rejected: {reason}")]
    Rejected { op: &'static str, reason: String },
    #[error("{op} transport failure: {reason}")]
    TransportFailure { op: &'static str, reason: String },
}

impl GatewayError {
    pub fn from_remote(op: &'static str, err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(reason) => GatewayError::Rejected { op, reason },
            RemoteError::Transport(reason) => GatewayError::TransportFailure { op, reason },
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            GatewayError::Timeout { op, .. }
            | GatewayError::Rejected { op, .. }
            | GatewayError::TransportFailure { op, .. } => op,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

/// Local checks that reject an operation before any remote call is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("both a currency and a direction must be selected")]
    SelectionIncomplete,
    #[error("identity has not been resolved")]
    IdentityUnavailable,
    #[error("name must not be empty")]
    EmptyName,
    #[error("no value is staged for saving")]
    NothingStaged,
    #[error("no published value to match")]
    NothingPublished,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("account information unavailable: {0}")]
    AccountUnavailable(String),
    #[error("name lookup for {address} failed: {reason}")]
    NameLookupFailed { address: String, reason: String },
    #[error("account {address} has no registered name")]
    NoRegisteredName { address: String },
}

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed by peer")]
    ClosedByPeer,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid node url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(#[from] Precondition),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn precondition(&self) -> Option<Precondition> {
        match self {
            EngineError::PreconditionUnmet(p) => Some(*p),
            _ => None,
        }
    }

    pub fn gateway(&self) -> Option<&GatewayError> {
        match self {
            EngineError::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
