//! Detection candidates
//!
//! A candidate is an endpoint string plus a display label. The endpoint is
//! classified exactly once, when the candidate is built, into one of three
//! shapes:
//!
//! - `host:port:extra` is a gpsd-style network endpoint
//! - [`PLATFORM_SOURCE`] is the platform location service
//! - anything else is a serial device path

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Reserved endpoint naming the platform location service
pub const PLATFORM_SOURCE: &str = "internalGPS";

/// Well-known local gpsd endpoint, tried before any serial port
pub const DEFAULT_NETWORK_ENDPOINT: &str = "localhost:2947:";

/// Address of a gpsd-style network service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Protocol-specific remainder, passed through verbatim
    pub extra: String,
}

impl NetworkEndpoint {
    /// Parse `host:port:extra...`
    ///
    /// At least three colon-separated fields are required; everything after
    /// the second colon (including further colons) is kept as `extra`.
    pub fn parse(endpoint: &str) -> Result<Self, DetectError> {
        let mut fields = endpoint.splitn(3, ':');
        let host = fields.next().unwrap_or_default();
        let port = fields
            .next()
            .ok_or_else(|| DetectError::malformed(endpoint, "missing port field"))?;
        let extra = fields
            .next()
            .ok_or_else(|| DetectError::malformed(endpoint, "missing extra field"))?;

        if host.is_empty() {
            return Err(DetectError::malformed(endpoint, "empty host"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| DetectError::malformed(endpoint, format!("invalid port {port:?}")))?;

        Ok(Self {
            host: host.to_string(),
            port,
            extra: extra.to_string(),
        })
    }

    /// `host:port` suitable for a socket connect
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NetworkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.extra)
    }
}

/// Classified endpoint shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// gpsd-style network service, tried once
    Network(NetworkEndpoint),
    /// Platform location service, tried once
    Platform,
    /// Serial device, swept across the baud list
    Serial {
        /// Device path (e.g. /dev/ttyUSB0, COM3)
        path: String,
    },
}

impl Endpoint {
    /// Classify an endpoint string by its lexical form
    pub fn classify(endpoint: &str) -> Result<Self, DetectError> {
        if endpoint.contains(':') {
            NetworkEndpoint::parse(endpoint).map(Self::Network)
        } else if endpoint == PLATFORM_SOURCE {
            Ok(Self::Platform)
        } else {
            Ok(Self::Serial {
                path: endpoint.to_string(),
            })
        }
    }

    /// Whether the baud sweep applies to this endpoint
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(net) => net.fmt(f),
            Self::Platform => f.write_str(PLATFORM_SOURCE),
            Self::Serial { path } => f.write_str(path),
        }
    }
}

/// One endpoint under consideration during a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Endpoint string as given or enumerated
    pub id: String,
    /// Human readable label
    pub label: String,
    /// Classified shape of `id`
    pub endpoint: Endpoint,
}

impl Candidate {
    /// Build and classify a candidate
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Result<Self, DetectError> {
        let id = id.into();
        let endpoint = Endpoint::classify(&id)?;
        Ok(Self {
            id,
            label: label.into(),
            endpoint,
        })
    }

    /// Candidate for a single user-specified endpoint, labelled with itself
    pub fn user_specified(id: &str) -> Result<Self, DetectError> {
        Self::new(id, id)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label == self.id {
            f.write_str(&self.id)
        } else {
            write!(f, "{} ({})", self.id, self.label)
        }
    }
}

/// Build the default candidate list in priority order
///
/// Platform source first (when supported), then the local gpsd endpoint,
/// then the given serial ports in the order they were reported.
pub fn default_candidates(
    platform_supported: bool,
    network_endpoint: &str,
    ports: Vec<(String, String)>,
) -> Result<Vec<Candidate>, DetectError> {
    let mut candidates = Vec::with_capacity(ports.len() + 2);

    if platform_supported {
        candidates.push(Candidate::new(PLATFORM_SOURCE, "internal GPS")?);
    }

    candidates.push(Candidate::new(network_endpoint, "local gpsd")?);

    for (id, label) in ports {
        candidates.push(Candidate::new(id, label)?);
    }

    Ok(candidates)
}
