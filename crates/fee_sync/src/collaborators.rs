//! Narrow interfaces to the services the engine talks to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{AccountInfo, AccountName, Currency, FeeField, ObligationSummary};

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn account(&self) -> Result<AccountInfo, RemoteError>;
    async fn account_names(&self, address: &str) -> Result<Vec<AccountName>, RemoteError>;
}

#[async_trait]
pub trait FeeAuthority: Send + Sync {
    async fn foreign_fee(&self, coin: Currency, field: FeeField) -> Result<String, RemoteError>;

    /// Persist `value` and return the value the authority actually stored.
    async fn update_foreign_fee(
        &self,
        coin: Currency,
        field: FeeField,
        value: &str,
    ) -> Result<String, RemoteError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn publish(
        &self,
        name: &str,
        service: &str,
        identifier: &str,
        data_base64: &str,
    ) -> Result<(), RemoteError>;

    /// `Ok(None)` when nothing is stored under the key.
    async fn fetch(
        &self,
        name: &str,
        service: &str,
        identifier: &str,
    ) -> Result<Option<String>, RemoteError>;
}

#[async_trait]
pub trait ObligationService: Send + Sync {
    async fn unsigned_fees(&self, address: &str) -> Result<Vec<ObligationSummary>, RemoteError>;
    async fn sign_all(&self) -> Result<(), RemoteError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub accounts: Arc<dyn AccountService>,
    pub fees: Arc<dyn FeeAuthority>,
    pub store: Arc<dyn ContentStore>,
    pub obligations: Arc<dyn ObligationService>,
}

impl Collaborators {
    /// Use one value that implements every interface, typically a node client.
    pub fn shared<T>(inner: Arc<T>) -> Self
    where
        T: AccountService + FeeAuthority + ContentStore + ObligationService + 'static,
    {
        Self {
            accounts: inner.clone(),
            fees: inner.clone(),
            store: inner.clone(),
            obligations: inner,
        }
    }
}
