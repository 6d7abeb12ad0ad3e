use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::config::FeeSyncConfig;
use crate::error::{HeartbeatError, Result};
use crate::gateway::Gateway;
use crate::heartbeat::{ChannelState, HeartbeatChannel, HeartbeatSettings, ObligationMonitor};
use crate::identity::{IdentityResolver, SessionContext};
use crate::node_client::NodeClient;
use crate::selection::SelectionTicket;
use crate::status::SigningStatus;
use crate::sync::{FeeSynchronizer, RefreshOutcome};
use crate::types::{Currency, Direction, Identity};

/// Wires the synchronizer, identity resolution and the heartbeat channel
/// around one set of collaborators.
pub struct FeeEngine {
    sync: Arc<FeeSynchronizer>,
    session: Arc<SessionContext>,
    status: Arc<SigningStatus>,
    resolver: Arc<IdentityResolver>,
    monitor: ObligationMonitor,
    heartbeat: Option<HeartbeatChannel>,
    background: Mutex<Vec<AbortHandle>>,
}

impl FeeEngine {
    pub fn new(config: &FeeSyncConfig, collaborators: Collaborators) -> Self {
        let gateway = Gateway::new(config.gateway_timeout());
        let session = Arc::new(SessionContext::new());
        let status = Arc::new(SigningStatus::new());
        let sync = FeeSynchronizer::new(&collaborators, gateway.clone(), session.clone())
            .with_unlocking_field(config.unlocking_field)
            .with_service_kind(config.service_kind.clone());
        let resolver = IdentityResolver::new(
            collaborators.accounts.clone(),
            gateway.clone(),
            session.clone(),
        );
        let monitor = ObligationMonitor::new(&collaborators, gateway, session.clone(), status.clone());
        Self {
            sync: Arc::new(sync),
            session,
            status,
            resolver: Arc::new(resolver),
            monitor,
            heartbeat: None,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Build an engine backed by the node described in `config`.
    pub fn connect(config: &FeeSyncConfig) -> Result<Self> {
        let client = NodeClient::from_config(config)?;
        Ok(Self::new(config, Collaborators::shared(Arc::new(client))))
    }

    /// Resolve identity, run the startup reconciliation and open the push
    /// channel when `push` is given. Everything runs in the background.
    pub fn start(&mut self, push: Option<HeartbeatSettings>) -> Result<()> {
        if let Some(settings) = &push {
            if !matches!(settings.url.scheme(), "ws" | "wss") {
                return Err(HeartbeatError::InvalidEndpoint(settings.url.to_string()).into());
            }
        }

        let resolver = self.resolver.clone();
        let sync = self.sync.clone();
        self.track(tokio::spawn(async move {
            let _ = resolve_and_refresh(&resolver, &sync).await;
        }));

        let monitor = self.monitor.clone();
        self.track(tokio::spawn(async move {
            let _ = monitor.reconcile().await;
        }));

        if let Some(settings) = push {
            info!(target: "fee_sync::heartbeat", url = %settings.url, "opening push channel");
            self.heartbeat = Some(HeartbeatChannel::spawn(settings, self.monitor.clone()));
        }
        Ok(())
    }

    /// Resolve identity in the foreground.
    pub async fn resolve_identity(&self) -> Result<Identity> {
        resolve_and_refresh(&self.resolver, &self.sync).await
    }

    /// Run the signing-status reconciliation in the foreground.
    pub async fn reconcile(&self) -> Result<bool> {
        self.monitor.reconcile().await
    }

    /// Choose a currency; returns the refresh task when the selection
    /// became complete or changed.
    pub fn select_currency(&self, currency: Currency) -> Option<JoinHandle<RefreshOutcome>> {
        let ticket = self.sync.select_currency(currency)?;
        Some(self.spawn_refresh(ticket))
    }

    pub fn select_direction(&self, direction: Direction) -> Option<JoinHandle<RefreshOutcome>> {
        let ticket = self.sync.select_direction(direction)?;
        Some(self.spawn_refresh(ticket))
    }

    fn spawn_refresh(&self, ticket: SelectionTicket) -> JoinHandle<RefreshOutcome> {
        let sync = self.sync.clone();
        self.track(tokio::spawn(async move { sync.refresh(&ticket).await }))
    }

    /// Remember `task` so shutdown cancels it even if the caller drops the handle.
    fn track<T>(&self, task: JoinHandle<T>) -> JoinHandle<T> {
        let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        background.retain(|handle| !handle.is_finished());
        background.push(task.abort_handle());
        task
    }

    pub fn sync(&self) -> &Arc<FeeSynchronizer> {
        &self.sync
    }

    pub fn status(&self) -> &Arc<SigningStatus> {
        &self.status
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn heartbeat_state(&self) -> Option<ChannelState> {
        self.heartbeat.as_ref().map(HeartbeatChannel::state)
    }

    pub fn subscribe_heartbeat(&self) -> Option<watch::Receiver<ChannelState>> {
        self.heartbeat.as_ref().map(HeartbeatChannel::subscribe)
    }

    /// Close the push channel with a normal close frame and cancel pending
    /// background work.
    pub async fn shutdown(mut self) {
        if let Some(mut channel) = self.heartbeat.take() {
            channel.stop().await;
        }
        let background = self.background.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in background.drain(..) {
            task.abort();
        }
        info!(target: "fee_sync::sync", "engine stopped");
    }
}

async fn resolve_and_refresh(resolver: &IdentityResolver, sync: &FeeSynchronizer) -> Result<Identity> {
    let identity = resolver.resolve().await?;
    // A selection made before the name was known fetched nothing for it.
    if let Some(ticket) = sync.current_ticket() {
        if let Err(err) = sync.fetch_self_published_for(&ticket).await {
            warn!(target: "fee_sync::identity", error = %err, "self-published refresh after identity resolution failed");
        }
    }
    Ok(identity)
}
