//! Result sink for writing classified endpoints to disk

use crate::error::PersistenceError;
use crate::proxy::models::{ClassifiedSet, Endpoint, ProtocolClass};
use crate::proxy::parser::EndpointParser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File holding every harvested endpoint, unfiltered
pub const RAW_FILE_NAME: &str = "proxygrab.txt";

/// Destination for one protocol class worth of endpoints
pub trait ResultSink {
    /// Replace the class's output with `endpoints`, returning where it went
    fn write(&self, class: ProtocolClass, endpoints: &[Endpoint]) -> Result<PathBuf, PersistenceError>;
}

/// Writes `<class>.txt` files into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, class: ProtocolClass) -> PathBuf {
        self.dir.join(class.file_name())
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(RAW_FILE_NAME)
    }

    /// Write the unfiltered harvest to `proxygrab.txt`
    pub fn write_raw(&self, endpoints: &[Endpoint]) -> Result<PathBuf, PersistenceError> {
        self.write_lines(self.raw_path(), endpoints)
    }

    fn write_lines(&self, path: PathBuf, endpoints: &[Endpoint]) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::new(&self.dir, e))?;
        EndpointParser::save_to_file(endpoints, &path).map_err(|e| PersistenceError::new(&path, e))?;
        Ok(path)
    }
}

impl ResultSink for FileSink {
    fn write(&self, class: ProtocolClass, endpoints: &[Endpoint]) -> Result<PathBuf, PersistenceError> {
        self.write_lines(self.path_for(class), endpoints)
    }
}

/// Outcome of writing one class
#[derive(Debug)]
pub struct PersistReport {
    pub class: ProtocolClass,
    pub count: usize,
    pub result: Result<PathBuf, PersistenceError>,
}

/// Write every persistable class; a failed write does not stop the others
pub fn persist<S: ResultSink + ?Sized>(set: &ClassifiedSet, sink: &S) -> Vec<PersistReport> {
    set.persistable()
        .map(|(class, endpoints)| {
            let result = sink.write(class, endpoints);
            match &result {
                Ok(path) => info!(%class, count = endpoints.len(), path = %path.display(), "saved endpoints"),
                Err(e) => warn!(%class, error = %e, "could not save endpoints"),
            }
            PersistReport {
                class,
                count: endpoints.len(),
                result,
            }
        })
        .collect()
}
