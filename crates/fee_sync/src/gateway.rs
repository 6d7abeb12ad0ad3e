use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::DEFAULT_GATEWAY_TIMEOUT_MS;
use crate::error::{GatewayError, RemoteError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_GATEWAY_TIMEOUT_MS);

/// Single exit point for calls to the fee authority and the content store.
///
/// The remote side may hold a request open until a human approves it, so the
/// bound is long. Calls are never retried here.
#[derive(Clone, Debug)]
pub struct Gateway {
    timeout: Duration,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Gateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn call<T, F>(&self, op: &'static str, request: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let timeout = self.timeout;
        let started = Instant::now();
        debug!(target: "fee_sync::gateway", op, timeout_ms = timeout.as_millis() as u64, "dispatch");
        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(value)) => {
                debug!(
                    target: "fee_sync::gateway",
                    op,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "completed"
                );
                Ok(value)
            }
            Ok(Err(err)) => {
                let err = GatewayError::from_remote(op, err);
                debug!(target: "fee_sync::gateway", op, error = %err, "remote call failed");
                Err(err)
            }
            Err(_) => {
                debug!(
                    target: "fee_sync::gateway",
                    op,
                    timeout_ms = timeout.as_millis() as u64,
                    "remote call timed out"
                );
                Err(GatewayError::Timeout { op, after: timeout })
            }
        }
    }
}
