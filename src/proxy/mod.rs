//! Proxy module for harvesting and classifying proxy endpoints
//!
//! This module provides functionality for:
//! - Parsing `host:port` endpoints from text and files
//! - Harvesting endpoints from a paginated listing
//! - Probing liveness and classifying forwarding protocol
//! - Validating many endpoints concurrently under a bound
//! - Saving classified endpoints to per-protocol files

pub mod checker;
pub mod models;
pub mod parser;
pub mod prober;
pub mod sink;
pub mod source;
pub mod validator;

pub use checker::{CheckerConfig, Classifier, HttpClassifier};
pub use models::{
    ClassificationResult, ClassifiedSet, Endpoint, ProbeOutcome, ProbeResult, ProtocolClass,
};
pub use parser::{EndpointParser, ParsedEndpoints};
pub use prober::LivenessProber;
pub use sink::{persist, FileSink, PersistReport, ResultSink, RAW_FILE_NAME};
pub use source::{harvest, EndpointSource, GeoNodeSource, Harvest, SourceConfig, SourcePage};
pub use validator::Validator;
