//! STOMP protocol versions and their WebSocket subprotocol names.

use std::fmt;

// ============================================================================
// Protocol
// ============================================================================

/// A STOMP protocol version offered during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// STOMP 1.0 (`v10.stomp`).
    V10,
    /// STOMP 1.1 (`v11.stomp`).
    V11,
    /// STOMP 1.2 (`v12.stomp`).
    V12,
}

impl Protocol {
    /// Returns the WebSocket subprotocol name.
    #[must_use]
    pub const fn subprotocol(&self) -> &'static str {
        match self {
            Self::V10 => "v10.stomp",
            Self::V11 => "v11.stomp",
            Self::V12 => "v12.stomp",
        }
    }

    /// Returns the version string used in `accept-version`.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        match self {
            Self::V10 => "1.0",
            Self::V11 => "1.1",
            Self::V12 => "1.2",
        }
    }

    /// Parses a subprotocol name such as `v12.stomp`.
    #[must_use]
    pub fn from_subprotocol(name: &str) -> Option<Self> {
        match name {
            "v10.stomp" => Some(Self::V10),
            "v11.stomp" => Some(Self::V11),
            "v12.stomp" => Some(Self::V12),
            _ => None,
        }
    }

    /// Parses a version string such as `1.2`.
    #[must_use]
    pub fn from_version(version: &str) -> Option<Self> {
        match version {
            "1.0" => Some(Self::V10),
            "1.1" => Some(Self::V11),
            "1.2" => Some(Self::V12),
            _ => None,
        }
    }

    /// Builds the `accept-version` header value for a negotiation list.
    #[must_use]
    pub fn accept_version(protocols: &[Protocol]) -> String {
        protocols
            .iter()
            .map(Protocol::version)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subprotocol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprotocol_names() {
        assert_eq!(Protocol::V12.subprotocol(), "v12.stomp");
        assert_eq!(Protocol::from_subprotocol("v11.stomp"), Some(Protocol::V11));
        assert_eq!(Protocol::from_subprotocol("stomp"), None);
    }

    #[test]
    fn test_accept_version() {
        assert_eq!(Protocol::accept_version(&[Protocol::V12]), "1.2");
        assert_eq!(
            Protocol::accept_version(&[Protocol::V11, Protocol::V12]),
            "1.1,1.2"
        );
    }

    #[test]
    fn test_from_version() {
        assert_eq!(Protocol::from_version("1.2"), Some(Protocol::V12));
        assert_eq!(Protocol::from_version("2.0"), None);
    }
}
