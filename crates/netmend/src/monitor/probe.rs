//! Reachability probe.
//!
//! The one step of the repair procedure that touches the network: a single
//! bounded GET against a highly available URL. Any 2xx counts as reachable.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::error::{Error, Result};

/// Default probe URL.
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";

/// Returns true if an HTTP status code counts as reachable.
pub fn is_reachable(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Authoritative "is the internet reachable" check.
pub trait ReachabilityProbe: Send + Sync + 'static {
    /// Issue one request and return the HTTP status code.
    ///
    /// Transport failures and timeouts are errors.
    fn check(&self) -> impl Future<Output = Result<u16>> + Send;
}

/// [`ReachabilityProbe`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: reqwest::Url,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe for `url` whose requests give up after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| Error::InvalidConfig(format!("probe url '{url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Probe URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> Result<u16> {
        debug!(url = %self.url, "reachability probe");
        let response = self.client.get(self.url.clone()).send().await?;
        Ok(response.status().as_u16())
    }
}
