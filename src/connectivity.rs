//! Online pre-check run before any enrichment call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::services::ConnectivitySettings;

/// Shown verbatim as the failure reason of annotations created while offline.
pub const OFFLINE_MESSAGE: &str = "You appear to be offline. Location details could not be loaded.";

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Always online. Used when no probe URL is configured.
pub struct AssumeOnline;

#[async_trait]
impl ConnectivityProbe for AssumeOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Switchable flag; lets tests and operators force offline mode.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Online if `url` answers at all (any status) within the timeout.
pub struct HttpProbe {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        match self
            .client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(target: "enrich", url = %self.url, error = %e, "connectivity probe failed");
                false
            }
        }
    }
}

/// Probe matching the configuration: HTTP when a probe URL is set, otherwise
/// [`AssumeOnline`].
pub fn probe_from_config(
    settings: &ConnectivitySettings,
    client: Client,
) -> Box<dyn ConnectivityProbe> {
    match &settings.probe_url {
        Some(url) => Box::new(HttpProbe::new(
            client,
            url.clone(),
            Duration::from_secs(settings.timeout_secs),
        )),
        None => Box::new(AssumeOnline),
    }
}
