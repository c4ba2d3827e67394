//! Concurrent validation of many endpoints under a fixed concurrency bound

use crate::proxy::checker::{CheckerConfig, Classifier, HttpClassifier};
use crate::proxy::models::{
    ClassificationResult, ClassifiedSet, Endpoint, ProbeOutcome, ProtocolClass,
};
use crate::proxy::prober::LivenessProber;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Fans classification out over a batch of endpoints
///
/// At most `concurrency` endpoints are in flight at once, and every batch
/// method waits for all of them before returning.
#[derive(Clone)]
pub struct Validator {
    classifier: Arc<dyn Classifier>,
    liveness: Option<LivenessProber>,
    concurrency: usize,
}

impl Validator {
    /// Create a validator using the HTTP classifier
    pub fn new(config: &CheckerConfig) -> Self {
        let validator = Self::with_classifier(
            Arc::new(HttpClassifier::from_config(config)),
            config.concurrency,
        );
        if config.liveness_gate {
            validator.with_liveness(LivenessProber::new(config.liveness_timeout))
        } else {
            validator
        }
    }

    /// Create a validator around any classifier
    pub fn with_classifier(classifier: Arc<dyn Classifier>, concurrency: usize) -> Self {
        Self {
            classifier,
            liveness: None,
            concurrency: concurrency.max(1),
        }
    }

    /// Require a bare connect to succeed before classifying
    pub fn with_liveness(mut self, prober: LivenessProber) -> Self {
        self.liveness = Some(prober);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classify a single endpoint
    pub async fn check_one(&self, endpoint: Endpoint) -> ClassificationResult {
        let start = Instant::now();

        if let Some(prober) = &self.liveness {
            if !prober.probe(&endpoint).await {
                return ClassificationResult::new(
                    endpoint,
                    ProbeOutcome::Unreachable("liveness check failed".to_string()),
                    None,
                );
            }
        }

        let outcome = self.classifier.check(&endpoint).await;
        let response_time_ms = outcome
            .is_success()
            .then(|| start.elapsed().as_millis() as u64);

        ClassificationResult::new(endpoint, outcome, response_time_ms)
    }

    /// Classify every endpoint; results come back in completion order
    pub async fn check_all(&self, endpoints: Vec<Endpoint>) -> Vec<ClassificationResult> {
        stream::iter(endpoints)
            .map(|endpoint| self.check_one(endpoint))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    /// Classify every endpoint and group the results by protocol class
    pub async fn validate_all(&self, endpoints: Vec<Endpoint>) -> ClassifiedSet {
        if endpoints.is_empty() {
            return ClassifiedSet::new();
        }

        let total = endpoints.len();
        info!(total, concurrency = self.concurrency, "validating endpoints");
        let start = Instant::now();

        let set: ClassifiedSet = self.check_all(endpoints).await.into_iter().collect();

        info!(
            total,
            classified = total - set.count(ProtocolClass::Unknown),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "validation finished"
        );
        set
    }

    /// Classify in the background, sending each result as soon as it completes
    ///
    /// The channel closes once the last endpoint is done. Dropping the
    /// receiver stops scheduling new probes.
    pub fn validate_stream(&self, endpoints: Vec<Endpoint>) -> mpsc::Receiver<ClassificationResult> {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let validator = self.clone();

        tokio::spawn(async move {
            let mut results = stream::iter(endpoints)
                .map(|endpoint| validator.check_one(endpoint))
                .buffer_unordered(validator.concurrency);

            while let Some(result) = results.next().await {
                if tx.send(result).await.is_err() {
                    debug!("result receiver dropped, stopping validation");
                    break;
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Classifier answering from a fixed list of working endpoints, recording
    /// how many checks overlap
    struct FakeClassifier {
        working: HashSet<String>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeClassifier {
        fn new(working: &[&str], delay: Duration) -> Self {
            Self {
                working: working.iter().map(ToString::to_string).collect(),
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn check(&self, endpoint: &Endpoint) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.working.contains(&endpoint.to_string()) {
                ProbeOutcome::Success(ProtocolClass::Http)
            } else {
                ProbeOutcome::Timeout
            }
        }
    }

    fn endpoints(list: &[&str]) -> Vec<Endpoint> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_validate_empty_input() {
        let fake = Arc::new(FakeClassifier::new(&[], Duration::ZERO));
        let validator = Validator::with_classifier(fake.clone(), 10);

        let set = validator.validate_all(Vec::new()).await;
        assert!(set.is_empty());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate_groups_by_class() {
        let fake = Arc::new(FakeClassifier::new(&["1.2.3.4:8080"], Duration::from_millis(5)));
        let validator = Validator::with_classifier(fake, 10);

        let set = validator
            .validate_all(endpoints(&["1.2.3.4:8080", "5.6.7.8:3128"]))
            .await;

        assert_eq!(set.get(ProtocolClass::Http), endpoints(&["1.2.3.4:8080"]).as_slice());
        assert_eq!(set.get(ProtocolClass::Unknown), endpoints(&["5.6.7.8:3128"]).as_slice());

        let persisted: Vec<_> = set.persistable().collect();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, ProtocolClass::Http);
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let list: Vec<Endpoint> = (1..=60)
            .map(|i| Endpoint::new(format!("10.0.0.{}", i), 8080).unwrap())
            .collect();
        let fake = Arc::new(FakeClassifier::new(&[], Duration::from_millis(20)));
        let validator = Validator::with_classifier(fake.clone(), 7);

        let results = validator.check_all(list).await;

        assert_eq!(results.len(), 60);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 60);
        let peak = fake.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 7, "peak concurrency {} exceeded bound", peak);
        assert!(peak > 1, "checks never overlapped");
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let fake = Arc::new(FakeClassifier::new(&[], Duration::ZERO));
        let validator = Validator::with_classifier(fake.clone(), 0);
        assert_eq!(validator.concurrency(), 1);

        let results = validator.check_all(endpoints(&["1.1.1.1:80", "2.2.2.2:80"])).await;
        assert_eq!(results.len(), 2);
        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validate_is_deterministic_per_endpoint() {
        let list = endpoints(&["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80", "4.4.4.4:80"]);
        let fake = Arc::new(FakeClassifier::new(&["2.2.2.2:80", "4.4.4.4:80"], Duration::from_millis(1)));
        let validator = Validator::with_classifier(fake, 3);

        let first = validator.validate_all(list.clone()).await;
        let second = validator.validate_all(list).await;

        for class in ProtocolClass::ALL {
            let a: HashSet<_> = first.get(class).iter().collect();
            let b: HashSet<_> = second.get(class).iter().collect();
            assert_eq!(a, b, "class {} differs between runs", class);
        }
        assert_eq!(first.count(ProtocolClass::Http), 2);
    }

    #[tokio::test]
    async fn test_successful_results_carry_timing() {
        let fake = Arc::new(FakeClassifier::new(&["1.1.1.1:80"], Duration::from_millis(1)));
        let validator = Validator::with_classifier(fake, 2);

        let results = validator.check_all(endpoints(&["1.1.1.1:80", "2.2.2.2:80"])).await;
        for result in results {
            if result.protocol_class() == ProtocolClass::Http {
                assert!(result.response_time_ms.is_some());
            } else {
                assert!(result.response_time_ms.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_liveness_gate_skips_unreachable() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let reachable = format!("127.0.0.1:{}", open_port);
        let unreachable = format!("127.0.0.1:{}", closed_port);
        let fake = Arc::new(FakeClassifier::new(&[reachable.as_str()], Duration::ZERO));
        let validator = Validator::with_classifier(fake.clone(), 4)
            .with_liveness(LivenessProber::new(Duration::from_secs(2)));

        let set = validator
            .validate_all(endpoints(&[reachable.as_str(), unreachable.as_str()]))
            .await;

        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert_eq!(set.get(ProtocolClass::Http), endpoints(&[reachable.as_str()]).as_slice());
        assert_eq!(set.get(ProtocolClass::Unknown), endpoints(&[unreachable.as_str()]).as_slice());
    }

    #[tokio::test]
    async fn test_validate_stream_yields_every_result() {
        let list: Vec<Endpoint> = (1..=25)
            .map(|i| Endpoint::new(format!("10.0.1.{}", i), 3128).unwrap())
            .collect();
        let fake = Arc::new(FakeClassifier::new(&["10.0.1.5:3128"], Duration::from_millis(2)));
        let validator = Validator::with_classifier(fake.clone(), 5);

        let mut rx = validator.validate_stream(list);
        let mut set = ClassifiedSet::new();
        while let Some(result) = rx.recv().await {
            set.insert(result);
        }

        assert_eq!(set.total(), 25);
        assert_eq!(set.count(ProtocolClass::Http), 1);
        assert!(fake.max_in_flight.load(Ordering::SeqCst) <= 5);
    }

    #[test]
    fn test_config_builds_http_validator() {
        let config = CheckerConfig::new().with_concurrency(12).with_liveness_gate(true);
        let validator = Validator::new(&config);
        assert_eq!(validator.concurrency(), 12);
        assert!(validator.liveness.is_some());
    }
}
