//! Liveness prober: a bare TCP connect with a timeout

use crate::proxy::models::{Endpoint, ProbeResult};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Default timeout for liveness probes in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Checks whether a transport connection to an endpoint can be opened
#[derive(Debug, Clone)]
pub struct LivenessProber {
    timeout: Duration,
}

impl Default for LivenessProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl LivenessProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Try one connection. Refused, unreachable, DNS failure and timeout all
    /// report `false`; there is no retry.
    pub async fn probe(&self, endpoint: &Endpoint) -> bool {
        let addr = (endpoint.dial_host(), endpoint.port());
        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!(%endpoint, error = %e, "connect failed");
                false
            }
            Err(_) => {
                trace!(%endpoint, "connect timed out");
                false
            }
        }
    }

    pub async fn probe_result(&self, endpoint: &Endpoint) -> ProbeResult {
        ProbeResult {
            endpoint: endpoint.clone(),
            reachable: self.probe(endpoint).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn test_prober_default_timeout() {
        let prober = LivenessProber::default();
        assert_eq!(prober.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();

        let prober = LivenessProber::new(Duration::from_secs(2));
        assert!(prober.probe(&endpoint).await);

        let result = prober.probe_result(&endpoint).await;
        assert!(result.reachable);
        assert_eq!(result.endpoint, endpoint);
    }

    #[tokio::test]
    async fn test_probe_refused() {
        let endpoint = Endpoint::new("127.0.0.1", closed_port().await).unwrap();
        let prober = LivenessProber::new(Duration::from_secs(2));
        assert!(!prober.probe(&endpoint).await);
    }

    #[tokio::test]
    async fn test_probe_bounded_by_timeout() {
        // Result depends on the network; only the bound is checked
        let endpoint: Endpoint = "10.255.255.1:81".parse().unwrap();
        let prober = LivenessProber::new(Duration::from_millis(200));

        let start = Instant::now();
        let _ = prober.probe(&endpoint).await;
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host() {
        let endpoint: Endpoint = "no-such-host.invalid:8080".parse().unwrap();
        let prober = LivenessProber::new(Duration::from_secs(2));
        assert!(!prober.probe(&endpoint).await);
    }
}
