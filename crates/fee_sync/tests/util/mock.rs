#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use fee_sync::encoding;
use fee_sync::{
    AccountInfo, AccountName, AccountService, Collaborators, ContentStore, Currency, FeeAuthority,
    FeeField, ObligationService, ObligationSummary, RemoteError,
};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    Echo,
    Reject,
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub name: String,
    pub service: String,
    pub identifier: String,
    pub data: String,
}

/// In-memory node that answers every collaborator interface.
#[derive(Default)]
pub struct MockNode {
    address: Mutex<Option<String>>,
    names: Mutex<Vec<String>>,
    fees: Mutex<HashMap<(Currency, FeeField), String>>,
    holds: Mutex<HashMap<(Currency, FeeField), oneshot::Receiver<()>>>,
    fetch_holds: Mutex<HashMap<(String, String), oneshot::Receiver<()>>>,
    unsigned_hold: Mutex<Option<oneshot::Receiver<()>>>,
    update_mode: Mutex<UpdateMode>,
    updates: Mutex<Vec<(Currency, FeeField, String)>>,
    resources: Mutex<HashMap<(String, String), String>>,
    published: Mutex<Vec<Published>>,
    unsigned: Mutex<Vec<ObligationSummary>>,
    fee_reads: AtomicUsize,
    fetches: AtomicUsize,
    unsigned_queries: AtomicUsize,
    sign_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_account(address: &str, names: &[&str]) -> Arc<Self> {
        let node = Self::default();
        *lock(&node.address) = Some(address.to_string());
        *lock(&node.names) = names.iter().map(|n| n.to_string()).collect();
        Arc::new(node)
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::shared(self.clone())
    }

    pub fn set_fee(&self, coin: Currency, field: FeeField, value: &str) {
        lock(&self.fees).insert((coin, field), value.to_string());
    }

    /// Hold the next read of this fee until the returned sender fires.
    pub fn hold_fee(&self, coin: Currency, field: FeeField) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.holds).insert((coin, field), rx);
        tx
    }

    /// Hold the next content-store read of `name`/`identifier`.
    pub fn hold_fetch(&self, name: &str, identifier: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.fetch_holds).insert((name.to_string(), identifier.to_string()), rx);
        tx
    }

    /// Hold the next unsigned-fee query.
    pub fn hold_unsigned(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.unsigned_hold) = Some(rx);
        tx
    }

    pub fn set_update_mode(&self, mode: UpdateMode) {
        *lock(&self.update_mode) = mode;
    }

    pub fn updates(&self) -> Vec<(Currency, FeeField, String)> {
        lock(&self.updates).clone()
    }

    pub fn store(&self, name: &str, identifier: &str, text: &str) {
        lock(&self.resources).insert(
            (name.to_string(), identifier.to_string()),
            encoding::to_transport(text),
        );
    }

    pub fn published(&self) -> Vec<Published> {
        lock(&self.published).clone()
    }

    pub fn set_unsigned(&self, count: usize) {
        *lock(&self.unsigned) = (0..count)
            .map(|i| ObligationSummary {
                at_address: format!("ATaddress{i}"),
                fee: 1_000,
                timestamp: i as u64,
            })
            .collect();
    }

    pub fn fee_read_count(&self) -> usize {
        self.fee_reads.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn unsigned_query_count(&self) -> usize {
        self.unsigned_queries.load(Ordering::SeqCst)
    }

    pub fn sign_count(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountService for MockNode {
    async fn account(&self) -> Result<AccountInfo, RemoteError> {
        let address = lock(&self.address).clone();
        address
            .map(|address| AccountInfo { address })
            .ok_or_else(|| RemoteError::Transport("account service offline".into()))
    }

    async fn account_names(&self, _address: &str) -> Result<Vec<AccountName>, RemoteError> {
        let names = lock(&self.names).clone();
        Ok(names.into_iter().map(|name| AccountName { name }).collect())
    }
}

#[async_trait]
impl FeeAuthority for MockNode {
    async fn foreign_fee(&self, coin: Currency, field: FeeField) -> Result<String, RemoteError> {
        self.fee_reads.fetch_add(1, Ordering::SeqCst);
        let hold = lock(&self.holds).remove(&(coin, field));
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let value = lock(&self.fees).get(&(coin, field)).cloned();
        value.ok_or_else(|| RemoteError::Rejected(format!("no {field} for {coin}")))
    }

    async fn update_foreign_fee(
        &self,
        coin: Currency,
        field: FeeField,
        value: &str,
    ) -> Result<String, RemoteError> {
        lock(&self.updates).push((coin, field, value.to_string()));
        let mode = *lock(&self.update_mode);
        match mode {
            UpdateMode::Echo => {
                lock(&self.fees).insert((coin, field), value.to_string());
                Ok(value.to_string())
            }
            UpdateMode::Reject => Err(RemoteError::Rejected("update denied".into())),
            UpdateMode::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ContentStore for MockNode {
    async fn publish(
        &self,
        name: &str,
        service: &str,
        identifier: &str,
        data_base64: &str,
    ) -> Result<(), RemoteError> {
        lock(&self.published).push(Published {
            name: name.to_string(),
            service: service.to_string(),
            identifier: identifier.to_string(),
            data: data_base64.to_string(),
        });
        lock(&self.resources).insert(
            (name.to_string(), identifier.to_string()),
            data_base64.to_string(),
        );
        Ok(())
    }

    async fn fetch(
        &self,
        name: &str,
        _service: &str,
        identifier: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let hold = lock(&self.fetch_holds).remove(&(name.to_string(), identifier.to_string()));
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let stored = lock(&self.resources)
            .get(&(name.to_string(), identifier.to_string()))
            .cloned();
        stored
            .map(|data| {
                encoding::from_transport(&data).map_err(|err| RemoteError::Rejected(err.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl ObligationService for MockNode {
    async fn unsigned_fees(&self, _address: &str) -> Result<Vec<ObligationSummary>, RemoteError> {
        self.unsigned_queries.fetch_add(1, Ordering::SeqCst);
        let hold = lock(&self.unsigned_hold).take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        Ok(lock(&self.unsigned).clone())
    }

    async fn sign_all(&self) -> Result<(), RemoteError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
