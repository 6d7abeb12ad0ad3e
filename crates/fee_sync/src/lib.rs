//! Keeps per-currency fee policy in step with a remote authority and a
//! content store, and tracks whether fee transactions await a signature.

pub mod collaborators;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod identity;
pub mod node_client;
pub mod selection;
pub mod status;
pub mod sync;
pub mod types;

pub use collaborators::{AccountService, Collaborators, ContentStore, FeeAuthority, ObligationService};
pub use config::{FeeSyncConfig, HeartbeatConfig, ReconnectPolicy};
pub use engine::FeeEngine;
pub use error::{
    ConfigError, EngineError, GatewayError, HeartbeatError, IdentityError, Precondition, RemoteError,
    Result,
};
pub use gateway::Gateway;
pub use heartbeat::{ChannelState, HeartbeatChannel, HeartbeatSettings, ObligationEvent, ObligationMonitor};
pub use identity::{IdentityResolver, SessionContext};
pub use node_client::NodeClient;
pub use selection::{SelectionMachine, SelectionState, SelectionTicket, Transition};
pub use status::SigningStatus;
pub use sync::{Delivery, FeeRecord, FeeSynchronizer, FeeView, PublishedSource, RefreshOutcome};
pub use types::{
    AccountInfo, AccountName, Currency, Direction, FeeField, Identity, ObligationSummary, RecordKey,
    Selection, UnlockingField,
};
