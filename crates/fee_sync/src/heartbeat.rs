//! Push channel reporting whether the account has unsigned fee transactions.
//!
//! One task reads inbound frames; a second task owns the probe schedule and
//! shares the write half of the socket with the shutdown path.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::collaborators::{AccountService, Collaborators, ObligationService};
use crate::config::{FeeSyncConfig, ReconnectPolicy};
use crate::error::{ConfigError, EngineError, GatewayError, HeartbeatError, Result};
use crate::gateway::Gateway;
use crate::identity::SessionContext;
use crate::status::SigningStatus;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;

pub const PROBE_TEXT: &str = "ping";
pub const SHUTDOWN_REASON: &str = "forced";
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObligationEvent {
    pub address: String,
    pub positive: bool,
}

/// Writes [`SigningStatus`] from push events and reconciliation queries.
#[derive(Clone)]
pub struct ObligationMonitor {
    session: Arc<SessionContext>,
    accounts: Arc<dyn AccountService>,
    obligations: Arc<dyn ObligationService>,
    gateway: Gateway,
    status: Arc<SigningStatus>,
}

impl ObligationMonitor {
    pub fn new(
        collaborators: &Collaborators,
        gateway: Gateway,
        session: Arc<SessionContext>,
        status: Arc<SigningStatus>,
    ) -> Self {
        Self {
            session,
            accounts: collaborators.accounts.clone(),
            obligations: collaborators.obligations.clone(),
            gateway,
            status,
        }
    }

    pub fn status(&self) -> &Arc<SigningStatus> {
        &self.status
    }

    /// One-shot query that initializes the status from the pending set.
    pub async fn reconcile(&self) -> Result<bool> {
        let address = self.address().await.map_err(|err| {
            warn!(target: "fee_sync::heartbeat", error = %err, "cannot reconcile without an account");
            EngineError::from(err)
        })?;
        let pending = self
            .gateway
            .call(
                "get_unsigned_fees",
                self.obligations.unsigned_fees(&address),
            )
            .await
            .map_err(|err| {
                warn!(target: "fee_sync::heartbeat", %address, error = %err, "reconciliation failed");
                EngineError::from(err)
            })?;
        let positive = !pending.is_empty();
        self.status.set(positive);
        info!(
            target: "fee_sync::heartbeat",
            %address,
            pending = pending.len(),
            "signing status reconciled"
        );
        Ok(positive)
    }

    /// Apply one inbound frame. Returns the new status when the frame was
    /// addressed to this account.
    pub fn handle_text(&self, text: &str) -> Option<bool> {
        let event: ObligationEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(err) => {
                debug!(target: "fee_sync::heartbeat", error = %err, "ignoring unrecognized frame");
                return None;
            }
        };
        let Some(address) = self.session.address() else {
            debug!(target: "fee_sync::heartbeat", "account not resolved yet; ignoring event");
            return None;
        };
        apply_event(&self.status, &event, address)
    }

    async fn address(&self) -> std::result::Result<String, GatewayError> {
        if let Some(address) = self.session.address() {
            return Ok(address.to_string());
        }
        let account = self
            .gateway
            .call("get_account", self.accounts.account())
            .await?;
        Ok(self.session.record_address(&account.address).to_string())
    }
}

fn apply_event(status: &SigningStatus, event: &ObligationEvent, address: &str) -> Option<bool> {
    if event.address != address {
        return None;
    }
    if status.set(event.positive) {
        debug!(target: "fee_sync::heartbeat", positive = event.positive, "signing status changed");
    }
    Some(event.positive)
}

#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub url: Url,
    pub initial_probe: Duration,
    pub probe_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl HeartbeatSettings {
    pub fn from_config(config: &FeeSyncConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            url: config.push_url()?,
            initial_probe: config.heartbeat.initial_probe(),
            probe_interval: config.heartbeat.probe_interval(),
            reconnect: config.heartbeat.reconnect.clone(),
        })
    }
}

pub struct HeartbeatChannel {
    state: watch::Receiver<ChannelState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatChannel {
    /// Open the channel in the background. Dropping the handle also asks the
    /// worker to close the socket.
    pub fn spawn(settings: HeartbeatSettings, monitor: ObligationMonitor) -> Self {
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            settings,
            monitor,
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(shutdown_rx));
        Self {
            state,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Close the socket with a normal close frame and wait for the worker.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(target: "fee_sync::heartbeat", error = %err, "heartbeat worker ended abnormally");
            }
        }
    }
}

enum SessionEnd {
    Stopped,
    Dropped(HeartbeatError),
}

struct Worker {
    settings: HeartbeatSettings,
    monitor: ObligationMonitor,
    state: watch::Sender<ChannelState>,
}

impl Worker {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut attempt: u32 = 0;
        loop {
            self.state.send_replace(ChannelState::Connecting);
            let connected = tokio::select! {
                res = connect_async(self.settings.url.as_str()) => res,
                _ = &mut shutdown => {
                    self.state.send_replace(ChannelState::Closed);
                    return;
                }
            };
            match connected {
                Ok((socket, _response)) => {
                    attempt = 0;
                    self.state.send_replace(ChannelState::Open);
                    info!(target: "fee_sync::heartbeat", url = %self.settings.url, "push channel open");
                    let monitor = self.monitor.clone();
                    let reconcile = tokio::spawn(async move {
                        let _ = monitor.reconcile().await;
                    });
                    let end = self.session(socket, &mut shutdown).await;
                    // A reconciliation must not outlive the connection that started it.
                    reconcile.abort();
                    self.state.send_replace(ChannelState::Closed);
                    match end {
                        SessionEnd::Stopped => {
                            info!(target: "fee_sync::heartbeat", "push channel closed");
                            return;
                        }
                        SessionEnd::Dropped(err) => {
                            warn!(target: "fee_sync::heartbeat", error = %err, "push channel dropped");
                        }
                    }
                }
                Err(err) => {
                    self.state.send_replace(ChannelState::Closed);
                    warn!(
                        target: "fee_sync::heartbeat",
                        url = %self.settings.url,
                        error = %err,
                        "push channel connect failed"
                    );
                }
            }
            let Some(delay) = self.settings.reconnect.delay(attempt) else {
                debug!(target: "fee_sync::heartbeat", "reconnect disabled; channel stays closed");
                return;
            };
            attempt = attempt.saturating_add(1);
            debug!(target: "fee_sync::heartbeat", delay_ms = delay.as_millis() as u64, attempt, "reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => return,
            }
        }
    }

    async fn session(&self, socket: Socket, shutdown: &mut oneshot::Receiver<()>) -> SessionEnd {
        let (sink, mut stream) = socket.split();
        let sink = Arc::new(AsyncMutex::new(sink));
        let mut probes = tokio::spawn(probe_loop(
            sink.clone(),
            self.settings.initial_probe,
            self.settings.probe_interval,
        ));
        let end = loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    probes.abort();
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: SHUTDOWN_REASON.into(),
                    };
                    if let Err(err) = sink.lock().await.send(Message::Close(Some(frame))).await {
                        debug!(target: "fee_sync::heartbeat", error = %err, "close frame not delivered");
                    }
                    let _ = tokio::time::timeout(CLOSE_GRACE, async {
                        while let Some(Ok(_)) = stream.next().await {}
                    })
                    .await;
                    break SessionEnd::Stopped;
                }
                probe = &mut probes => {
                    let err = match probe {
                        Ok(Err(err)) => err,
                        _ => HeartbeatError::ClosedByPeer,
                    };
                    break SessionEnd::Dropped(err);
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.monitor.handle_text(&text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break SessionEnd::Dropped(HeartbeatError::ClosedByPeer);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break SessionEnd::Dropped(err.into()),
                },
            }
        };
        probes.abort();
        end
    }
}

async fn probe_loop(
    sink: Arc<AsyncMutex<SocketSink>>,
    initial: Duration,
    interval: Duration,
) -> std::result::Result<(), HeartbeatError> {
    tokio::time::sleep(initial).await;
    loop {
        sink.lock()
            .await
            .send(Message::Text(PROBE_TEXT.to_string()))
            .await?;
        debug!(target: "fee_sync::heartbeat", "liveness probe sent");
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(address: &str, positive: bool) -> ObligationEvent {
        ObligationEvent {
            address: address.into(),
            positive,
        }
    }

    #[test]
    fn matching_address_sets_status() {
        let status = SigningStatus::new();
        assert_eq!(apply_event(&status, &event("Q1", true), "Q1"), Some(true));
        assert!(status.has_unsigned_obligations());
        assert_eq!(apply_event(&status, &event("Q1", false), "Q1"), Some(false));
        assert!(!status.has_unsigned_obligations());
    }

    #[test]
    fn foreign_address_leaves_status_alone() {
        let status = SigningStatus::new();
        apply_event(&status, &event("Q1", true), "Q1");
        assert_eq!(apply_event(&status, &event("Q2", false), "Q1"), None);
        assert!(status.has_unsigned_obligations());
    }

    #[test]
    fn events_parse_from_push_payloads() {
        let parsed: ObligationEvent =
            serde_json::from_str(r#"{"address":"Q1","positive":true,"extra":1}"#).unwrap();
        assert_eq!(parsed, event("Q1", true));
        assert!(serde_json::from_str::<ObligationEvent>("{}").is_err());
    }
}
