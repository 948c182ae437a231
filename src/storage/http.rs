//! # HTTP Remote Store
//!
//! Client for the onboarding document endpoint:
//!
//! - `GET   {base}/v1/users/{id}/onboarding` returns a [`RemoteDocument`],
//!   `404` when the user has none yet
//! - `PATCH {base}/v1/users/{id}/onboarding` merges `{progress, cleared}` into
//!   the document and answers `{ "updatedAt": ... }`
//!
//! Every failure (transport, timeout, non-2xx status, undecodable body) is a
//! [`SyncError::Network`] so callers can queue the mutation for retry.

use super::{RemoteDocument, RemoteStore};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::progress::ProgressSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    identity: RwLock<Option<String>>,
    token: RwLock<Option<String>>,
}

#[derive(Debug, Serialize)]
struct PatchBody<'a> {
    progress: Option<&'a ProgressSnapshot>,
    cleared: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteAck {
    updated_at: DateTime<Utc>,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity: RwLock::new(None),
            token: RwLock::new(None),
        })
    }

    /// Store for the configured `remote_url`, or `None` when none is set
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>> {
        config.remote_url.as_deref().map(Self::new).transpose()
    }

    /// Sign in as `user_id`, optionally with a bearer token
    pub fn sign_in(&self, user_id: impl Into<String>, token: Option<String>) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id.into());
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn sign_out(&self) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn document_url(&self) -> Result<String> {
        let user_id = self
            .identity()
            .ok_or_else(|| SyncError::network("not signed in"))?;
        Ok(format!("{}/v1/users/{}/onboarding", self.base_url, user_id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().unwrap_or_else(|e| e.into_inner()).as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn patch(&self, body: &PatchBody<'_>) -> Result<DateTime<Utc>> {
        let url = self.document_url()?;
        let response = self
            .authorize(self.client.patch(&url).json(body))
            .send()
            .await
            .map_err(|e| SyncError::network(format!("PATCH {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::network(format!("PATCH {} returned {}", url, status)));
        }

        let ack: WriteAck = response
            .json()
            .await
            .map_err(|e| SyncError::network(format!("invalid write acknowledgement: {}", e)))?;
        Ok(ack.updated_at)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn identity(&self) -> Option<String> {
        self.identity.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn fetch_progress(&self) -> Result<Option<serde_json::Value>> {
        let url = self.document_url()?;
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::network(format!("GET {} failed: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: RemoteDocument = response
                    .json()
                    .await
                    .map_err(|e| SyncError::network(format!("invalid remote document: {}", e)))?;
                Ok(document.live_progress().cloned())
            }
            status => Err(SyncError::network(format!("GET {} returned {}", url, status))),
        }
    }

    async fn merge_write(&self, snapshot: &ProgressSnapshot) -> Result<DateTime<Utc>> {
        self.patch(&PatchBody {
            progress: Some(snapshot),
            cleared: false,
        })
        .await
    }

    async fn write_tombstone(&self) -> Result<DateTime<Utc>> {
        self.patch(&PatchBody {
            progress: None,
            cleared: true,
        })
        .await
    }
}
