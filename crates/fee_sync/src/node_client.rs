//! HTTP client for a node that serves every collaborator interface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::collaborators::{AccountService, ContentStore, FeeAuthority, ObligationService};
use crate::config::FeeSyncConfig;
use crate::error::{ConfigError, RemoteError};
use crate::types::{AccountInfo, AccountName, Currency, FeeField, ObligationSummary};

const API_KEY_HEADER: &str = "X-API-KEY";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct NodeClient {
    http: Client,
    base: Url,
    api_key: Option<String>,
    account_address: Option<String>,
}

impl NodeClient {
    pub fn new(base: Url) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base,
            api_key: None,
            account_address: None,
        })
    }

    pub fn from_config(config: &FeeSyncConfig) -> Result<Self, ConfigError> {
        let base = config.node_url()?;
        let mut client = Self::new(base).map_err(|err| ConfigError::InvalidUrl {
            url: config.node_url.clone(),
            reason: err.to_string(),
        })?;
        client.api_key = config.api_key.clone();
        client.account_address = config.account_address.clone();
        Ok(client)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_account_address(mut self, address: impl Into<String>) -> Self {
        self.account_address = Some(address.into());
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), RemoteError> {
        let response = self.authorize(request).send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(target: "fee_sync::gateway", %status, bytes = body.len(), "node response");
        Ok((status, body))
    }

    async fn text(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        Ok(body.trim().to_string())
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let body = self.text(request).await?;
        serde_json::from_str(&body)
            .map_err(|err| RemoteError::Transport(format!("malformed response: {err}")))
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

fn rejected(status: StatusCode, body: &str) -> RemoteError {
    let body = body.trim();
    if body.is_empty() {
        RemoteError::Rejected(status.to_string())
    } else {
        RemoteError::Rejected(format!("{status}: {body}"))
    }
}

#[async_trait]
impl AccountService for NodeClient {
    async fn account(&self) -> Result<AccountInfo, RemoteError> {
        match &self.account_address {
            Some(address) => Ok(AccountInfo {
                address: address.clone(),
            }),
            None => Err(RemoteError::Rejected(
                "no account address configured".into(),
            )),
        }
    }

    async fn account_names(&self, address: &str) -> Result<Vec<AccountName>, RemoteError> {
        let url = self.endpoint(&["names", "address", address])?;
        self.json(self.http.get(url)).await
    }
}

#[async_trait]
impl FeeAuthority for NodeClient {
    async fn foreign_fee(&self, coin: Currency, field: FeeField) -> Result<String, RemoteError> {
        let url = self.endpoint(&["crosschain", coin.coin_param(), field.as_str()])?;
        self.text(self.http.get(url)).await
    }

    async fn update_foreign_fee(
        &self,
        coin: Currency,
        field: FeeField,
        value: &str,
    ) -> Result<String, RemoteError> {
        let route = format!("update{}", field.as_str());
        let url = self.endpoint(&["crosschain", coin.coin_param(), &route])?;
        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(value.to_string());
        self.text(request).await
    }
}

#[async_trait]
impl ContentStore for NodeClient {
    async fn publish(
        &self,
        name: &str,
        service: &str,
        identifier: &str,
        data_base64: &str,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["arbitrary", service, name, identifier, "base64"])?;
        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(data_base64.to_string());
        self.text(request).await.map(|_| ())
    }

    async fn fetch(
        &self,
        name: &str,
        service: &str,
        identifier: &str,
    ) -> Result<Option<String>, RemoteError> {
        let url = self.endpoint(&["arbitrary", service, name, identifier])?;
        let (status, body) = self.send(self.http.get(url)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(rejected(status, &body));
        }
        let body = body.trim();
        Ok((!body.is_empty()).then(|| body.to_string()))
    }
}

#[async_trait]
impl ObligationService for NodeClient {
    async fn unsigned_fees(&self, address: &str) -> Result<Vec<ObligationSummary>, RemoteError> {
        let url = self.endpoint(&["crosschain", "unsignedfees", address])?;
        self.json(self.http.get(url)).await
    }

    async fn sign_all(&self) -> Result<(), RemoteError> {
        let url = self.endpoint(&["crosschain", "signfees"])?;
        self.text(self.http.post(url)).await.map(|_| ())
    }
}
