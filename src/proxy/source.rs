//! Endpoint source for harvesting candidates from a paginated listing
//!
//! This module provides:
//! - The [`EndpointSource`] trait, one page per call
//! - [`GeoNodeSource`], a JSON listing client
//! - [`harvest`], the page loop that keeps everything collected before a failure

use crate::error::SourceError;
use crate::proxy::models::Endpoint;
use crate::proxy::parser::EndpointParser;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default listing endpoint
pub const DEFAULT_BASE_URL: &str = "https://proxylist.geonode.com/api/proxy-list";

/// Default number of entries requested per page
const DEFAULT_PAGE_SIZE: u32 = 500;

/// Default timeout for listing requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for listing requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration for the listing source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Listing URL, without query string
    pub base_url: String,
    /// Entries per page (`limit` parameter)
    pub page_size: u32,
    /// `sort_by` parameter
    pub sort_by: String,
    /// `sort_type` parameter
    pub sort_type: String,
    /// Timeout for each page request
    pub timeout: Duration,
    /// User agent for page requests
    pub user_agent: String,
    /// Stop after this many pages even if more are available
    pub max_pages: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: "lastChecked".to_string(),
            sort_type: "desc".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: None,
        }
    }
}

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// One page of listing results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePage {
    /// Valid endpoints on the page
    pub endpoints: Vec<Endpoint>,
    /// False once the listing returned no entries at all
    pub has_more: bool,
}

/// Provider of candidate endpoints, one page at a time
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Fetch a page, numbered from 1
    async fn fetch_page(&self, page: u32) -> std::result::Result<SourcePage, SourceError>;
}

/// Outcome of a harvest run
#[derive(Debug, Default)]
pub struct Harvest {
    /// Endpoints collected, duplicates removed, in listing order
    pub endpoints: Vec<Endpoint>,
    /// Pages requested, including a failed one
    pub pages_fetched: u32,
    /// The failure that ended the harvest, if any
    pub error: Option<SourceError>,
}

impl Harvest {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Loop over pages until the source runs dry, fails, or `max_pages` is reached
///
/// A failure keeps every endpoint gathered from earlier pages.
pub async fn harvest<S: EndpointSource + ?Sized>(source: &S, max_pages: Option<u32>) -> Harvest {
    let mut collected = Vec::new();
    let mut result = Harvest::default();
    let mut page = 1;

    loop {
        if max_pages.map_or(false, |max| page > max) {
            info!(max_pages = ?max_pages, "page limit reached");
            break;
        }

        result.pages_fetched = page;
        match source.fetch_page(page).await {
            Ok(fetched) => {
                if !fetched.has_more {
                    info!(page, "no more endpoints, stopping");
                    break;
                }
                collected.extend(fetched.endpoints);
                info!(page, total = collected.len(), "fetched page");
            }
            Err(e) => {
                warn!(page, error = %e, "harvest stopped");
                result.error = Some(e);
                break;
            }
        }

        page += 1;
    }

    let before = collected.len();
    result.endpoints = EndpointParser::dedup(collected);
    if result.endpoints.len() < before {
        debug!(
            duplicates = before - result.endpoints.len(),
            "removed duplicate endpoints"
        );
    }

    result
}

/// Listing entry; everything besides `ip` and `port` is ignored
#[derive(Debug, Deserialize)]
struct ListingEntry {
    ip: Option<String>,
    port: Option<Value>,
}

/// Client for the GeoNode-style JSON listing
pub struct GeoNodeSource {
    config: SourceConfig,
    client: Client,
}

impl GeoNodeSource {
    /// Create a new source with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(SourceConfig::default())
    }

    /// Create a new source with custom configuration
    pub fn with_config(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Decode a page body
    ///
    /// The body must be a JSON object holding a `data` array. Entries without
    /// a usable `ip` and `port` are skipped. Only an empty `data` array ends
    /// the listing; `total` and `limit` are not trusted.
    pub fn parse_page(page: u32, body: &str) -> std::result::Result<SourcePage, SourceError> {
        let value: Value =
            serde_json::from_str(body).map_err(|source| SourceError::Json { page, source })?;

        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(SourceError::Shape {
                    page,
                    reason: format!("expected an object, found {}", json_kind(&other)),
                })
            }
        };

        let data = match object.remove("data") {
            Some(Value::Array(data)) => data,
            Some(other) => {
                return Err(SourceError::Shape {
                    page,
                    reason: format!("`data` is {}, expected an array", json_kind(&other)),
                })
            }
            None => {
                return Err(SourceError::Shape {
                    page,
                    reason: "missing `data`".to_string(),
                })
            }
        };

        let raw_count = data.len();
        let endpoints: Vec<Endpoint> = data
            .into_iter()
            .filter_map(|entry| Self::parse_entry(page, entry))
            .collect();

        Ok(SourcePage {
            endpoints,
            has_more: raw_count > 0,
        })
    }

    fn parse_entry(page: u32, entry: Value) -> Option<Endpoint> {
        let entry: ListingEntry = match serde_json::from_value(entry) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(page, error = %e, "skipping malformed entry");
                return None;
            }
        };

        let ip = entry.ip.filter(|ip| !ip.is_empty())?;
        let port = match entry.port? {
            Value::String(port) => port,
            Value::Number(port) => port.to_string(),
            _ => return None,
        };

        let candidate = format!("{}:{}", ip, port);
        match candidate.parse() {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                debug!(page, candidate = %candidate, error = %e, "skipping invalid entry");
                None
            }
        }
    }
}

#[async_trait]
impl EndpointSource for GeoNodeSource {
    async fn fetch_page(&self, page: u32) -> std::result::Result<SourcePage, SourceError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("limit", self.config.page_size.to_string()),
                ("page", page.to_string()),
                ("sort_by", self.config.sort_by.clone()),
                ("sort_type", self.config.sort_type.clone()),
            ])
            .send()
            .await
            .map_err(|source| SourceError::Transport { page, source })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SourceError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| SourceError::Transport { page, source })?;

        Self::parse_page(page, &body)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
