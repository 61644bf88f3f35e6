//! Elvin router URIs
//!
//! ```text
//! elvin:[version]/[protocol]/host[:port][;name=value]...
//! ```
//!
//! e.g. `elvin://localhost`, `elvin:4.0/secure/router.example.com:29170`,
//! `elvin://[::1]:2917;Packet.Max-Length=8192`.

use crate::error::InvalidUriError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 2917;
pub const VERSION_MAJOR: u32 = 4;
pub const VERSION_MINOR: u32 = 0;

static URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+):([^/]+)?/([^/]+)?/([^;/][^;]*)(;.*)?$").expect("valid URI regex")
});
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?$").expect("valid version regex"));
static PROTOCOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\w+),(\w+),(\w+)|secure)$").expect("valid protocol regex"));
static IPV6_ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\[[^\]]+\])(?::(\d+))?$").expect("valid endpoint regex"));
static ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+)(?::(\d+))?$").expect("valid endpoint regex"));
static OPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^;([^=;]+)=([^=;]*)").expect("valid option regex"));

pub fn default_protocol() -> Vec<String> {
    vec!["tcp".into(), "none".into(), "xdr".into()]
}

pub fn secure_protocol() -> Vec<String> {
    vec!["ssl".into(), "none".into(), "xdr".into()]
}

/// A parsed Elvin URI
///
/// Equality and hashing use the parsed fields, not the original text, so
/// `elvin://host` equals `elvin:4.0/tcp,none,xdr/host:2917`.
#[derive(Debug, Clone)]
pub struct ElvinUri {
    text: String,
    pub scheme: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub protocol: Vec<String>,
    pub host: String,
    pub port: u16,
    pub options: BTreeMap<String, String>,
}

impl ElvinUri {
    pub fn parse(text: &str) -> Result<Self, InvalidUriError> {
        let caps = URI_RE
            .captures(text)
            .ok_or_else(|| InvalidUriError::new(text, "Not a valid Elvin URI"))?;

        let mut uri = ElvinUri {
            text: text.to_string(),
            scheme: caps[1].to_string(),
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            protocol: default_protocol(),
            host: String::new(),
            port: DEFAULT_PORT,
            options: BTreeMap::new(),
        };

        if uri.scheme != "elvin" {
            return Err(InvalidUriError::new(
                text,
                format!("Invalid scheme: {}", uri.scheme),
            ));
        }
        if let Some(version) = caps.get(2) {
            uri.parse_version(version.as_str())?;
        }
        if let Some(protocol) = caps.get(3) {
            uri.parse_protocol(protocol.as_str())?;
        }
        uri.parse_endpoint(&caps[4])?;
        if let Some(options) = caps.get(5) {
            uri.parse_options(options.as_str())?;
        }

        Ok(uri)
    }

    fn invalid(&self, reason: impl Into<String>) -> InvalidUriError {
        InvalidUriError::new(self.text.clone(), reason)
    }

    fn parse_version(&mut self, expr: &str) -> Result<(), InvalidUriError> {
        let caps = VERSION_RE
            .captures(expr)
            .ok_or_else(|| self.invalid(format!("Invalid version string: \"{}\"", expr)))?;

        let too_large = || self.invalid(format!("Number too large in version string: \"{}\"", expr));
        let major = caps[1].parse().map_err(|_| too_large())?;
        let minor = match caps.get(2) {
            Some(minor) => minor.as_str().parse().map_err(|_| too_large())?,
            None => self.version_minor,
        };

        self.version_major = major;
        self.version_minor = minor;
        Ok(())
    }

    fn parse_protocol(&mut self, expr: &str) -> Result<(), InvalidUriError> {
        let caps = PROTOCOL_RE
            .captures(expr)
            .ok_or_else(|| self.invalid(format!("Invalid protocol: \"{}\"", expr)))?;

        self.protocol = if caps.get(1).is_some() {
            expr.split(',').map(str::to_string).collect()
        } else {
            secure_protocol()
        };
        Ok(())
    }

    fn parse_endpoint(&mut self, endpoint: &str) -> Result<(), InvalidUriError> {
        let re = if endpoint.starts_with('[') {
            &*IPV6_ENDPOINT_RE
        } else {
            &*ENDPOINT_RE
        };

        let caps = re
            .captures(endpoint)
            .ok_or_else(|| self.invalid("Invalid port number"))?;

        self.host = caps[1].to_string();
        if let Some(port) = caps.get(2) {
            self.port = port
                .as_str()
                .parse()
                .map_err(|_| self.invalid("Invalid port number"))?;
        }
        Ok(())
    }

    fn parse_options(&mut self, mut expr: &str) -> Result<(), InvalidUriError> {
        let original = expr;
        while !expr.is_empty() {
            let caps = OPTION_RE
                .captures(expr)
                .ok_or_else(|| self.invalid(format!("Invalid options: \"{}\"", original)))?;
            self.options.insert(caps[1].to_string(), caps[2].to_string());
            expr = &expr[caps[0].len()..];
        }
        Ok(())
    }

    /// The text this URI was parsed from
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fully expanded form with defaults filled in and options sorted
    pub fn canonical(&self) -> String {
        let mut out = format!(
            "{}:{}.{}/{}/{}:{}",
            self.scheme,
            self.version_major,
            self.version_minor,
            self.protocol.join(","),
            self.host,
            self.port
        );
        for (name, value) in &self.options {
            out.push(';');
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }

    pub fn is_secure(&self) -> bool {
        self.protocol == secure_protocol()
    }

    /// `host:port`, the key routers use to group links
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }
}

impl PartialEq for ElvinUri {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.host == other.host
            && self.port == other.port
            && self.version_major == other.version_major
            && self.version_minor == other.version_minor
            && self.options == other.options
            && self.protocol == other.protocol
    }
}

impl Eq for ElvinUri {}

impl Hash for ElvinUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.host.hash(state);
        self.port.hash(state);
        self.protocol.hash(state);
    }
}

impl FromStr for ElvinUri {
    type Err = InvalidUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElvinUri::parse(s)
    }
}

impl fmt::Display for ElvinUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let uri = ElvinUri::parse("elvin://elvin.example.com").unwrap();
        assert_eq!(uri.host, "elvin.example.com");
        assert_eq!(uri.port, DEFAULT_PORT);
        assert_eq!((uri.version_major, uri.version_minor), (4, 0));
        assert_eq!(uri.protocol, default_protocol());
        assert!(!uri.is_secure());
        assert_eq!(uri.to_string(), "elvin://elvin.example.com");
    }

    #[test]
    fn test_full_uri() {
        let uri = ElvinUri::parse("elvin:5.1/ssl,none,xdr/host:1234;b=2;a=1").unwrap();
        assert_eq!((uri.version_major, uri.version_minor), (5, 1));
        assert!(uri.is_secure());
        assert_eq!(uri.port, 1234);
        assert_eq!(uri.option("a"), Some("1"));
        assert_eq!(uri.canonical(), "elvin:5.1/ssl,none,xdr/host:1234;a=1;b=2");
    }

    #[test]
    fn test_secure_shorthand() {
        let uri = ElvinUri::parse("elvin:/secure/host").unwrap();
        assert_eq!(uri.protocol, secure_protocol());
        assert_eq!(uri.endpoint(), "host:2917");
    }

    #[test]
    fn test_version_without_minor() {
        let uri = ElvinUri::parse("elvin:5//host").unwrap();
        assert_eq!((uri.version_major, uri.version_minor), (5, 0));
    }

    #[test]
    fn test_ipv6() {
        let uri = ElvinUri::parse("elvin://[::1]:4567").unwrap();
        assert_eq!(uri.host, "[::1]");
        assert_eq!(uri.port, 4567);

        let uri = ElvinUri::parse("elvin://[fe80::1]").unwrap();
        assert_eq!(uri.port, DEFAULT_PORT);
    }

    #[test]
    fn test_equality_ignores_text() {
        let a = ElvinUri::parse("elvin://host").unwrap();
        let b = ElvinUri::parse("elvin:4.0/tcp,none,xdr/host:2917").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ElvinUri::parse("elvin://host:2918").unwrap());
    }

    #[test]
    fn test_invalid() {
        for bad in [
            "http://host",
            "elvin:",
            "elvin://",
            "elvin:x.y//host",
            "elvin:/tcp,xdr/host",
            "elvin://host:port",
            "elvin://host:99999",
            "elvin://host;name",
            "elvin:99999999999//host",
        ] {
            assert!(ElvinUri::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }
}
