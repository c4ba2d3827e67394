//! Error types surfaced by the harvester and the result sink
//!
//! Per-endpoint probe failures are not errors: they are folded into
//! [`ProbeOutcome`](crate::proxy::ProbeOutcome) values by the prober and the
//! classifier and never reach the caller as `Err`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a `host:port` string is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    #[error("missing ':' separator between host and port")]
    MissingPort,
    #[error("host is empty")]
    EmptyHost,
    #[error("invalid host: {0:?}")]
    InvalidHost(String),
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
}

/// Failure while fetching or decoding a listing page. Ends the harvest.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request for page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("page {page} returned HTTP status {status}")]
    Status { page: u32, status: u16 },
    #[error("page {page} is not valid JSON: {source}")]
    Json {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("page {page} has an unexpected shape: {reason}")]
    Shape { page: u32, reason: String },
}

impl SourceError {
    /// Page number the error happened on
    pub fn page(&self) -> u32 {
        match self {
            SourceError::Transport { page, .. }
            | SourceError::Status { page, .. }
            | SourceError::Json { page, .. }
            | SourceError::Shape { page, .. } => *page,
        }
    }
}

/// Failure writing one output file. Only that file is affected.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl PersistenceError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
