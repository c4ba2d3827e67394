//! Endpoint parser for reading and writing line-oriented endpoint lists

use crate::error::EndpointParseError;
use crate::proxy::models::Endpoint;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Matches an optional `scheme://` prefix and trailing slash around `host:port`
static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?|socks[45]h?)://([^/]+?)/?$").expect("Invalid scheme regex")
});

/// Endpoints parsed from a block of text
#[derive(Debug, Clone, Default)]
pub struct ParsedEndpoints {
    pub endpoints: Vec<Endpoint>,
    /// Lines that were not blank or comments but failed to parse
    pub rejected: usize,
}

/// Endpoint parser for parsing endpoints from strings and files
pub struct EndpointParser;

impl EndpointParser {
    /// Parse a single line
    ///
    /// Blank lines and `#` comments yield `Ok(None)`. Accepts `host:port` and
    /// `scheme://host:port`; anything else is an error.
    pub fn parse_line(line: &str) -> std::result::Result<Option<Endpoint>, EndpointParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let authority = SCHEME_REGEX
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map_or(line, |m| m.as_str());

        authority.parse().map(Some)
    }

    /// Parse endpoints from a string (multiple lines)
    pub fn parse_string(content: &str) -> ParsedEndpoints {
        let mut parsed = ParsedEndpoints::default();

        for (index, line) in content.lines().enumerate() {
            match Self::parse_line(line) {
                Ok(Some(endpoint)) => parsed.endpoints.push(endpoint),
                Ok(None) => {}
                Err(e) => {
                    debug!(line = index + 1, content = line.trim(), error = %e, "rejected endpoint");
                    parsed.rejected += 1;
                }
            }
        }

        parsed
    }

    /// Parse endpoints from a file
    ///
    /// A missing file is not an error: it yields no endpoints.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedEndpoints> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse_string(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "endpoint file not found");
                Ok(ParsedEndpoints::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove duplicates, keeping the first occurrence of each endpoint
    pub fn dedup(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        let mut seen = HashSet::with_capacity(endpoints.len());
        endpoints
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.clone()))
            .collect()
    }

    /// Save endpoints to a file, one `host:port` per line, replacing any prior content
    pub fn save_to_file<P: AsRef<Path>>(endpoints: &[Endpoint], path: P) -> io::Result<()> {
        let content: String = endpoints
            .iter()
            .map(|endpoint| format!("{}\n", endpoint))
            .collect();

        fs::write(path, content)
    }
}
