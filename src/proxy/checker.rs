//! Protocol classifier: forwards one request through an endpoint

use crate::proxy::models::{Endpoint, ProbeOutcome, ProtocolClass};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 200;

/// Default URL to test proxies against; answers 200 when reached directly
pub const DEFAULT_TEST_URL: &str = "https://httpstat.us/200";

/// Default timeout for the optional liveness gate in seconds
const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 5;

/// Configuration for proxy checking
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each classification request
    pub timeout: Duration,
    /// Maximum number of endpoints probed at once
    pub concurrency: usize,
    /// Reference URL requested through each endpoint
    pub test_url: String,
    /// Run a bare connect before classifying
    pub liveness_gate: bool,
    /// Timeout for the liveness connect
    pub liveness_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_TEST_URL.to_string(),
            liveness_gate: false,
            liveness_timeout: Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_liveness_gate(mut self, enabled: bool) -> Self {
        self.liveness_gate = enabled;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }
}

/// Decides which forwarding protocol an endpoint speaks
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Probe the endpoint once. Never fails: every error is an outcome.
    async fn check(&self, endpoint: &Endpoint) -> ProbeOutcome;

    async fn classify(&self, endpoint: &Endpoint) -> ProtocolClass {
        self.check(endpoint).await.protocol_class()
    }
}

/// Classifies endpoints by sending a GET for the reference URL through them
/// as a plain HTTP proxy
///
/// Only [`ProtocolClass::Http`] is ever assigned; HTTPS and SOCKS endpoints
/// end up as `Unknown` unless they also forward plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    timeout: Duration,
    test_url: String,
}

impl HttpClassifier {
    pub fn new(timeout: Duration, test_url: impl Into<String>) -> Self {
        Self {
            timeout,
            test_url: test_url.into(),
        }
    }

    pub fn from_config(config: &CheckerConfig) -> Self {
        Self::new(config.timeout, config.test_url.clone())
    }

    /// Create a reqwest client routed through the endpoint
    fn create_client(&self, endpoint: &Endpoint) -> Result<Client> {
        let proxy = ReqwestProxy::all(endpoint.http_proxy_url())?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()?;

        Ok(client)
    }

    fn outcome_from_error(error: &reqwest::Error) -> ProbeOutcome {
        if error.is_timeout() {
            ProbeOutcome::Timeout
        } else if error.is_connect() {
            ProbeOutcome::Unreachable(error.to_string())
        } else {
            ProbeOutcome::ProtocolMismatch(error.to_string())
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn check(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let client = match self.create_client(endpoint) {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::ProtocolMismatch(e.to_string()),
        };

        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, client.get(&self.test_url).send()).await {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    ProbeOutcome::Success(ProtocolClass::Http)
                } else {
                    ProbeOutcome::ProtocolMismatch(format!("HTTP status: {}", response.status()))
                }
            }
            Ok(Err(e)) => Self::outcome_from_error(&e),
            Err(_) => ProbeOutcome::Timeout,
        };

        trace!(%endpoint, %outcome, elapsed_ms = start.elapsed().as_millis() as u64, "classified");
        outcome
    }
}
