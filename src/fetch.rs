//! JSON-over-HTTP transport shared by the leaf clients.
//!
//! Clients build a full [`Url`] (query included) and hand it to a
//! [`JsonFetcher`]. Production uses [`HttpFetcher`]; tests substitute a scripted
//! fetcher so no network is touched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::services::HttpSettings;
use crate::error::EnrichError;

#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET `url` and decode the body as JSON.
    async fn get_json(&self, url: Url) -> Result<Value, EnrichError>;
}

pub type SharedFetcher = Arc<dyn JsonFetcher>;

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn get_json(&self, url: Url) -> Result<Value, EnrichError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichError::NotFound);
        }
        if !status.is_success() {
            tracing::debug!(target: "enrich", %host, status = status.as_u16(), "non-success status");
            return Err(EnrichError::Transport(format!("{host} answered {status}")));
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| EnrichError::upstream(format!("{host}: {e}")))
    }
}

/// Parse a configured base URL, attaching the key/value pairs as query string.
pub fn url_with_query(base: &str, pairs: &[(&str, String)]) -> Result<Url, EnrichError> {
    let mut url = Url::parse(base).map_err(|e| EnrichError::Transport(format!("bad url {base}: {e}")))?;
    {
        let mut q = url.query_pairs_mut();
        for (k, v) in pairs {
            q.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Deterministic fetcher: answers from canned routes matched by URL prefix and
/// records every URL it was asked for. Used by tests and local demos.
#[derive(Default)]
pub struct MockFetcher {
    routes: Vec<(String, MockReply)>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[derive(Clone)]
enum MockReply {
    Json(Value),
    Fail(String),
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer URLs starting with `prefix` with `body`. First matching route wins.
    pub fn route(mut self, prefix: impl Into<String>, body: Value) -> Self {
        self.routes.push((prefix.into(), MockReply::Json(body)));
        self
    }

    /// Fail URLs starting with `prefix` with a transport error.
    pub fn fail(mut self, prefix: impl Into<String>, msg: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), MockReply::Fail(msg.into())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|u| u.starts_with(prefix)).count()
    }
}

#[async_trait]
impl JsonFetcher for MockFetcher {
    async fn get_json(&self, url: Url) -> Result<Value, EnrichError> {
        let url = url.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.clone());
        }
        let reply = self
            .routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, r)| r.clone());
        match reply {
            Some(MockReply::Json(v)) => Ok(v),
            Some(MockReply::Fail(msg)) => Err(EnrichError::Transport(msg)),
            None => Err(EnrichError::Transport(format!("no mock route for {url}"))),
        }
    }
}
