//! The three operator-facing operations: harvest, harvest and validate, and
//! validate an existing file

use crate::error::PersistenceError;
use crate::proxy::{
    harvest, persist, ClassifiedSet, Endpoint, EndpointParser, EndpointSource, FileSink,
    GeoNodeSource, ProtocolClass, Validator,
};
use crate::{Config, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a run did, for reporting to the operator
///
/// Only listing failures and write failures show up here; unreachable
/// endpoints are ordinary `Unknown` results inside `classified`.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Endpoints collected from the listing
    pub harvested: usize,
    /// Endpoints loaded from an input file
    pub loaded: usize,
    /// Input lines that were not valid endpoints
    pub rejected: usize,
    /// Why harvesting stopped early
    pub source_error: Option<String>,
    /// Validation results, if validation ran
    pub classified: Option<ClassifiedSet>,
    /// Files written, with the number of endpoints in each
    pub written: Vec<(PathBuf, usize)>,
    /// Files that could not be written
    pub write_errors: Vec<PersistenceError>,
}

impl RunReport {
    /// Number of endpoints classified as anything other than `Unknown`
    pub fn working(&self) -> usize {
        self.classified.as_ref().map_or(0, |set| {
            set.total() - set.count(ProtocolClass::Unknown)
        })
    }

    fn record_write(&mut self, result: std::result::Result<PathBuf, PersistenceError>, count: usize) {
        match result {
            Ok(path) => self.written.push((path, count)),
            Err(e) => self.write_errors.push(e),
        }
    }
}

/// Wires a source, a validator and a file sink together
pub struct Pipeline {
    source: Box<dyn EndpointSource>,
    validator: Validator,
    sink: FileSink,
    max_pages: Option<u32>,
}

impl Pipeline {
    /// Build the pipeline from configuration, using the GeoNode listing
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = GeoNodeSource::with_config(config.source.clone())?;
        Ok(Self::new(
            Box::new(source),
            Validator::new(&config.checker),
            FileSink::new(&config.output_dir),
        )
        .with_max_pages(config.source.max_pages))
    }

    pub fn new(source: Box<dyn EndpointSource>, validator: Validator, sink: FileSink) -> Self {
        Self {
            source,
            validator,
            sink,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn sink(&self) -> &FileSink {
        &self.sink
    }

    /// Harvest the listing and save the raw endpoints
    pub async fn harvest(&self) -> RunReport {
        let mut report = RunReport::default();
        self.collect(&mut report).await;
        report
    }

    /// Harvest the listing, save the raw endpoints, then validate and save
    /// each protocol class
    pub async fn harvest_and_validate(&self) -> RunReport {
        let mut report = RunReport::default();
        let endpoints = self.collect(&mut report).await;
        if !endpoints.is_empty() {
            let set = self.validator.validate_all(endpoints).await;
            self.persist(set, &mut report);
        }
        report
    }

    /// Validate the endpoints listed in a file and save each protocol class
    ///
    /// A missing file yields an empty report and writes nothing.
    pub async fn validate_file(&self, path: &Path) -> Result<RunReport> {
        let mut report = RunReport::default();
        let endpoints = self.load(path, &mut report)?;
        if !endpoints.is_empty() {
            let set = self.validator.validate_all(endpoints).await;
            self.persist(set, &mut report);
        }
        Ok(report)
    }

    /// Harvest and write `proxygrab.txt`, returning the endpoints for validation
    pub async fn collect(&self, report: &mut RunReport) -> Vec<Endpoint> {
        let harvest = harvest(self.source.as_ref(), self.max_pages).await;
        report.harvested = harvest.endpoints.len();
        report.source_error = harvest.error.as_ref().map(ToString::to_string);

        if harvest.endpoints.is_empty() {
            warn!("no endpoints harvested");
            return harvest.endpoints;
        }

        let raw = self.sink.write_raw(&harvest.endpoints);
        if let Ok(path) = &raw {
            info!(count = harvest.endpoints.len(), path = %path.display(), "saved harvested endpoints");
        }
        report.record_write(raw, harvest.endpoints.len());
        harvest.endpoints
    }

    /// Read endpoints from a file, deduplicated
    pub fn load(&self, path: &Path, report: &mut RunReport) -> Result<Vec<Endpoint>> {
        let parsed = EndpointParser::parse_file(path)?;
        report.rejected = parsed.rejected;
        if parsed.rejected > 0 {
            warn!(rejected = parsed.rejected, path = %path.display(), "skipped malformed lines");
        }

        let endpoints = EndpointParser::dedup(parsed.endpoints);
        report.loaded = endpoints.len();
        info!(count = endpoints.len(), path = %path.display(), "loaded endpoints");
        Ok(endpoints)
    }

    /// Save every persistable class of `set` and record the outcome
    pub fn persist(&self, set: ClassifiedSet, report: &mut RunReport) {
        for written in persist(&set, &self.sink) {
            report.record_write(written.result, written.count);
        }
        report.classified = Some(set);
    }
}
