//! Proxygrab - Proxy Harvester and Checker
//!
//! Harvests candidate proxy endpoints from a paginated listing, checks them
//! concurrently through a reference URL, and writes the working ones to one
//! file per protocol class.

pub mod error;
pub mod logging;
pub mod pipeline;
pub mod proxy;
pub mod tui;

pub use error::{EndpointParseError, PersistenceError, SourceError};
pub use pipeline::{Pipeline, RunReport};
pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the output files are written to
    pub output_dir: PathBuf,
    /// Listing source settings
    pub source: SourceConfig,
    /// Checker settings
    pub checker: CheckerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            source: SourceConfig::default(),
            checker: CheckerConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    pub fn with_checker(mut self, checker: CheckerConfig) -> Self {
        self.checker = checker;
        self
    }
}
