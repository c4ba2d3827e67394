//! Proxy data models

use crate::error::EndpointParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Forwarding protocol an endpoint is believed to support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolClass {
    Http,
    Https,
    Socks4,
    Socks5,
    Unknown,
}

impl ProtocolClass {
    pub const ALL: [ProtocolClass; 5] = [
        ProtocolClass::Http,
        ProtocolClass::Https,
        ProtocolClass::Socks4,
        ProtocolClass::Socks5,
        ProtocolClass::Unknown,
    ];

    /// Output file name for this class, e.g. `http.txt`
    pub fn file_name(&self) -> String {
        format!("{}.txt", self)
    }

    /// Whether endpoints of this class are written out. `Unknown` never is.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, ProtocolClass::Unknown)
    }
}

impl fmt::Display for ProtocolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolClass::Http => write!(f, "http"),
            ProtocolClass::Https => write!(f, "https"),
            ProtocolClass::Socks4 => write!(f, "socks4"),
            ProtocolClass::Socks5 => write!(f, "socks5"),
            ProtocolClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// A proxy candidate identified by host and port
///
/// Always valid once constructed: the host is non-empty and the port is in
/// `1..=65535`. The canonical form is `host:port`, and parsing that form back
/// yields an identical value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint, validating the host and port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointParseError> {
        let host = host.into();
        validate_host(&host)?;
        if port == 0 {
            return Err(EndpointParseError::InvalidPort(port.to_string()));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host to dial, with IPv6 brackets removed
    pub fn dial_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// URL for using this endpoint as a plain HTTP forwarding proxy
    pub fn http_proxy_url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or(EndpointParseError::MissingPort)?;
        validate_host(host)?;
        let port = parse_port(port)?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

fn validate_host(host: &str) -> Result<(), EndpointParseError> {
    if host.is_empty() {
        return Err(EndpointParseError::EmptyHost);
    }
    if host.chars().any(|c| c.is_whitespace()) {
        return Err(EndpointParseError::InvalidHost(host.to_string()));
    }
    let valid = match host.strip_prefix('[') {
        // Bracketed IPv6 literal
        Some(rest) => rest
            .strip_suffix(']')
            .map_or(false, |inner| !inner.is_empty() && !inner.contains(['[', ']'])),
        None => !host.contains([':', '[', ']', '/', '@']),
    };
    if valid {
        Ok(())
    } else {
        Err(EndpointParseError::InvalidHost(host.to_string()))
    }
}

fn parse_port(port: &str) -> Result<u16, EndpointParseError> {
    let invalid = || EndpointParseError::InvalidPort(port.to_string());
    // Digits only, no sign, no leading zero: keeps the string form canonical.
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) || port.starts_with('0') {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())
}

/// Typed result of probing one endpoint
///
/// None of these variants abort a batch; everything other than `Success`
/// collapses to [`ProtocolClass::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success(ProtocolClass),
    Unreachable(String),
    Timeout,
    ProtocolMismatch(String),
}

impl ProbeOutcome {
    pub fn protocol_class(&self) -> ProtocolClass {
        match self {
            ProbeOutcome::Success(class) => *class,
            _ => ProtocolClass::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Success(class) => write!(f, "{}", class),
            ProbeOutcome::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            ProbeOutcome::Timeout => write!(f, "timed out"),
            ProbeOutcome::ProtocolMismatch(reason) => write!(f, "protocol mismatch: {}", reason),
        }
    }
}

/// Output of the liveness prober
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub reachable: bool,
}

/// Classification of a single endpoint, produced once per submitted endpoint
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub endpoint: Endpoint,
    pub outcome: ProbeOutcome,
    pub response_time_ms: Option<u64>,
}

impl ClassificationResult {
    pub fn new(endpoint: Endpoint, outcome: ProbeOutcome, response_time_ms: Option<u64>) -> Self {
        Self {
            endpoint,
            outcome,
            response_time_ms,
        }
    }

    pub fn protocol_class(&self) -> ProtocolClass {
        self.outcome.protocol_class()
    }
}

/// Endpoints grouped by protocol class, each group in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedSet {
    groups: BTreeMap<ProtocolClass, Vec<Endpoint>>,
}

impl ClassifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: ClassificationResult) {
        self.groups
            .entry(result.protocol_class())
            .or_default()
            .push(result.endpoint);
    }

    pub fn get(&self, class: ProtocolClass) -> &[Endpoint] {
        self.groups.get(&class).map_or(&[], Vec::as_slice)
    }

    pub fn count(&self, class: ProtocolClass) -> usize {
        self.get(class).len()
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Classes present in the set, including `Unknown`
    pub fn classes(&self) -> impl Iterator<Item = ProtocolClass> + '_ {
        self.groups
            .iter()
            .filter(|(_, endpoints)| !endpoints.is_empty())
            .map(|(class, _)| *class)
    }

    /// Non-empty groups that get written out
    pub fn persistable(&self) -> impl Iterator<Item = (ProtocolClass, &[Endpoint])> {
        self.groups
            .iter()
            .filter(|(class, endpoints)| class.is_persisted() && !endpoints.is_empty())
            .map(|(class, endpoints)| (*class, endpoints.as_slice()))
    }
}

impl FromIterator<ClassificationResult> for ClassifiedSet {
    fn from_iter<I: IntoIterator<Item = ClassificationResult>>(iter: I) -> Self {
        let mut set = ClassifiedSet::new();
        for result in iter {
            set.insert(result);
        }
        set
    }
}

impl Extend<ClassificationResult> for ClassifiedSet {
    fn extend<I: IntoIterator<Item = ClassificationResult>>(&mut self, iter: I) {
        for result in iter {
            self.insert(result);
        }
    }
}
