//! Remote frame source address.

use std::fmt;

/// Host of the reference CV200 camera when paired over its own hotspot.
pub const DEFAULT_HOST: &str = "192.168.43.1";

/// Port the CV200 streams frames on.
pub const DEFAULT_PORT: u16 = 13456;

/// A `(host, port)` pair naming the device that produces frames.
///
/// No validation happens here. A host that cannot be resolved or parsed
/// shows up later as a failed connection attempt, which the client treats
/// like any other closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The WebSocket URL for this endpoint: `ws://<host>:<port>`.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Parse a `host:port` string, splitting on the last colon.
    ///
    /// Returns `None` when there is no colon or the port is not a `u16`.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        let port = port.parse().ok()?;
        Some(Self::new(host, port))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_reference_device() {
        let ep = Endpoint::new("192.168.43.1", 13456);
        assert_eq!(ep.url(), "ws://192.168.43.1:13456");
        assert_eq!(ep.to_string(), "192.168.43.1:13456");
    }

    #[test]
    fn default_is_reference_device() {
        assert_eq!(Endpoint::default(), Endpoint::new(DEFAULT_HOST, DEFAULT_PORT));
    }

    #[test]
    fn malformed_host_is_not_rejected() {
        let ep = Endpoint::new("not a host", 1);
        assert_eq!(ep.url(), "ws://not a host:1");
    }

    #[test]
    fn parse_host_port() {
        let ep = Endpoint::parse("10.0.0.7:9000").unwrap();
        assert_eq!(ep.host(), "10.0.0.7");
        assert_eq!(ep.port(), 9000);

        assert!(Endpoint::parse("10.0.0.7").is_none());
        assert!(Endpoint::parse("10.0.0.7:http").is_none());
        assert!(Endpoint::parse("10.0.0.7:70000").is_none());
    }
}
