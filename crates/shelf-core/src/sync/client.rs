//! Remote metadata service client
//!
//! [`RemoteLibrary`] is the seam between the sync engine and the network;
//! [`HttpRemote`] talks to the real service over HTTP:
//!
//! - `GET {url}` returns the full snapshot
//! - `POST {url}` accepts one push batch
//!
//! Every request carries the configured timeout and, when set, the routing
//! selector header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use super::diagnostic::{describe_body, describe_failure};
use super::error::{SyncError, SyncResult};
use super::message::{PushBatch, RemoteSnapshot};
use crate::config::Config;

/// Header carrying the alternate remote selector
pub const SELECTOR_HEADER: &str = "X-Shelf-Remote";

/// Client side of the remote metadata service
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// Fetch the full remote state
    async fn pull(&self) -> SyncResult<RemoteSnapshot>;

    /// Send one batch of local state
    ///
    /// Implementations must upsert every record by id and never replace a
    /// collection wholesale: several sequential batches form one logical
    /// push, and earlier batches carry empty small collections.
    async fn push(&self, batch: &PushBatch) -> SyncResult<()>;
}

/// HTTP implementation of [`RemoteLibrary`]
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    url: String,
    selector: Option<String>,
    timeout: Duration,
}

impl HttpRemote {
    /// Create a client for the service at `url`
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            selector: None,
            timeout,
        })
    }

    /// Route requests to an alternate remote
    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector.filter(|s| !s.trim().is_empty());
        self
    }

    /// Build a client from configuration
    ///
    /// Fails with [`SyncError::NotConfigured`] when no URL is set.
    pub fn from_config(config: &Config) -> SyncResult<Self> {
        let url = config
            .sync_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SyncError::NotConfigured)?;

        Ok(Self::new(url, config.request_timeout())?.with_selector(config.remote_selector.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.selector {
            Some(selector) => request.header(SELECTOR_HEADER, selector),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self
            .with_headers(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = describe_failure(&body);
        warn!("Remote returned {}: {}", status, message);
        Err(SyncError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> SyncError {
        if error.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl RemoteLibrary for HttpRemote {
    async fn pull(&self) -> SyncResult<RemoteSnapshot> {
        debug!("Pulling snapshot from {}", self.url);
        let response = self.send(self.client.get(&self.url)).await?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        serde_json::from_str(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("{} (body: {})", e, describe_body(&body))))
    }

    async fn push(&self, batch: &PushBatch) -> SyncResult<()> {
        debug!(
            "Pushing batch to {}: {} books, {} tags, {} annotations, {} sessions",
            self.url,
            batch.books.len(),
            batch.tags.len(),
            batch.annotations.len(),
            batch.reading_sessions.len()
        );
        self.send(self.client.post(&self.url).json(batch)).await?;
        Ok(())
    }
}
