use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::collaborators::AccountService;
use crate::error::IdentityError;
use crate::gateway::Gateway;
use crate::types::Identity;

/// Session-scoped identity shared by the synchronizer and the heartbeat
/// filter. Each value is set at most once.
#[derive(Debug)]
pub struct SessionContext {
    address: OnceCell<String>,
    identity: watch::Sender<Option<Identity>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (identity, _rx) = watch::channel(None);
        Self {
            address: OnceCell::new(),
            identity,
        }
    }

    /// A session whose identity is already known.
    pub fn resolved(identity: Identity) -> Self {
        let session = Self::new();
        session.publish(identity);
        session
    }

    pub fn address(&self) -> Option<&str> {
        self.address.get().map(String::as_str)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Record the account address. A later, different address is ignored.
    pub(crate) fn record_address(&self, address: &str) -> &str {
        self.address.get_or_init(|| address.to_string())
    }

    /// Publish the identity once; returns the identity consumers will see.
    pub(crate) fn publish(&self, identity: Identity) -> Identity {
        self.record_address(&identity.address);
        let mut current = identity;
        self.identity.send_if_modified(|slot| match slot {
            Some(existing) => {
                current = existing.clone();
                false
            }
            None => {
                *slot = Some(current.clone());
                true
            }
        });
        current
    }
}

pub struct IdentityResolver {
    accounts: Arc<dyn AccountService>,
    gateway: Gateway,
    session: Arc<SessionContext>,
}

impl IdentityResolver {
    pub fn new(
        accounts: Arc<dyn AccountService>,
        gateway: Gateway,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            accounts,
            gateway,
            session,
        }
    }

    pub async fn resolve(&self) -> Result<Identity, IdentityError> {
        if let Some(identity) = self.session.identity() {
            return Ok(identity);
        }
        let account = self
            .gateway
            .call("get_account", self.accounts.account())
            .await
            .map_err(|err| {
                warn!(target: "fee_sync::identity", error = %err, "account lookup failed");
                IdentityError::AccountUnavailable(err.to_string())
            })?;
        let address = self.session.record_address(&account.address).to_string();
        let names = self
            .gateway
            .call("get_account_names", self.accounts.account_names(&address))
            .await
            .map_err(|err| {
                warn!(target: "fee_sync::identity", %address, error = %err, "name lookup failed");
                IdentityError::NameLookupFailed {
                    address: address.clone(),
                    reason: err.to_string(),
                }
            })?;
        let Some(first) = names.into_iter().next() else {
            warn!(target: "fee_sync::identity", %address, "account has no registered name");
            return Err(IdentityError::NoRegisteredName { address });
        };
        let identity = self.session.publish(Identity {
            address,
            registered_name: first.name,
        });
        info!(
            target: "fee_sync::identity",
            address = %identity.address,
            name = %identity.registered_name,
            "identity resolved"
        );
        Ok(identity)
    }
}
