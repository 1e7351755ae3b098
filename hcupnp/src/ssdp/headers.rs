//! Parsing des datagrammes SSDP reçus par le control point

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::trace;

use super::MAX_AGE;

/// Why a datagram was not accepted as an SSDP record.
///
/// These never leave the discovery client: non-conforming devices are common
/// on real networks and their datagrams are simply dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryParseError {
    #[error("datagram is not valid UTF-8")]
    NotUtf8,

    #[error("empty datagram")]
    Empty,

    #[error("unknown SSDP start line: {0}")]
    UnknownStartLine(String),

    #[error("malformed header line: {0}")]
    MalformedHeader(String),
}

/// Kind of SSDP message, from its start line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsdpMessageKind {
    /// `HTTP/1.1 200 OK` reply to our M-SEARCH
    SearchResponse,
    /// `NOTIFY * HTTP/1.1` announcement
    Notify,
    /// `M-SEARCH * HTTP/1.1` from another control point (or our own, looped back)
    Search,
}

/// One parsed SSDP record: its kind plus a case-insensitive header mapping.
#[derive(Debug, Clone)]
pub struct SsdpHeaders {
    kind: SsdpMessageKind,
    headers: HashMap<String, String>,
    from: Option<SocketAddr>,
}

impl SsdpHeaders {
    pub fn kind(&self) -> SsdpMessageKind {
        self.kind
    }

    /// Sender of the datagram, when known
    pub fn from(&self) -> Option<SocketAddr> {
        self.from
    }

    pub fn with_sender(mut self, from: SocketAddr) -> Self {
        self.from = Some(from);
        self
    }

    /// Header value, looked up case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Header names (upper-cased) and values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// URL of the device description document
    pub fn location(&self) -> Option<&str> {
        self.get("LOCATION").filter(|l| !l.is_empty())
    }

    pub fn usn(&self) -> Option<&str> {
        self.get("USN")
    }

    /// `ST` for search responses, `NT` for notifications
    pub fn search_target(&self) -> Option<&str> {
        self.get("ST").or_else(|| self.get("NT"))
    }

    pub fn server(&self) -> Option<&str> {
        self.get("SERVER")
    }

    /// `max-age` from CACHE-CONTROL, [`MAX_AGE`] when absent or unreadable
    pub fn max_age(&self) -> u32 {
        parse_max_age(self.get("CACHE-CONTROL"))
    }
}

/// Parse one raw datagram into an [`SsdpHeaders`] record.
///
/// The start line must be an HTTP response, a NOTIFY or an M-SEARCH. Header
/// parsing stops at the first empty line; any non-empty line without a `:`
/// rejects the whole datagram.
pub fn parse_datagram(data: &[u8]) -> Result<SsdpHeaders, DiscoveryParseError> {
    let text = std::str::from_utf8(data).map_err(|_| DiscoveryParseError::NotUtf8)?;
    let mut lines = text.lines();

    let first_line = lines
        .by_ref()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(DiscoveryParseError::Empty)?;

    let upper = first_line.to_ascii_uppercase();
    let kind = if upper.starts_with("HTTP/") {
        SsdpMessageKind::SearchResponse
    } else if upper.starts_with("NOTIFY ") {
        SsdpMessageKind::Notify
    } else if upper.starts_with("M-SEARCH ") {
        SsdpMessageKind::Search
    } else {
        return Err(DiscoveryParseError::UnknownStartLine(first_line.to_string()));
    };

    let headers = parse_headers(lines)?;

    Ok(SsdpHeaders {
        kind,
        headers,
        from: None,
    })
}

fn parse_headers<'a, I>(lines: I) -> Result<HashMap<String, String>, DiscoveryParseError>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();

        // Empty line marks end of headers
        if line.is_empty() {
            break;
        }

        // Split on first ':' only (values may contain ':')
        let Some((name, value)) = line.split_once(':') else {
            return Err(DiscoveryParseError::MalformedHeader(line.to_string()));
        };

        let name = name.trim().to_ascii_uppercase();
        if name.is_empty() {
            return Err(DiscoveryParseError::MalformedHeader(line.to_string()));
        }

        // EXT: is legitimately empty
        headers.insert(name, value.trim().to_string());
    }
    Ok(headers)
}

fn parse_max_age(value: Option<&str>) -> u32 {
    if let Some(v) = value {
        let lower = v.to_ascii_lowercase();
        if let Some(idx) = lower.find("max-age") {
            let after_key = &v[idx + 7..];
            let after_eq = after_key.trim_start().trim_start_matches('=').trim_start();
            let digits: String = after_eq
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(age) = digits.parse::<u32>() {
                return age;
            }
        }
        trace!(
            "Could not parse max-age from CACHE-CONTROL: '{}', using default {}",
            v,
            MAX_AGE
        );
    }
    MAX_AGE
}
