//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tracker_link::{ClientOptions, ReconnectPolicy, TransportMode};
//!
//! let options = ClientOptions::new()
//!     .with_mode(TransportMode::WebSocket)
//!     .with_connect_timeout(Duration::from_secs(10))
//!     .with_reconnect(ReconnectPolicy::disabled());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, Protocol};
use crate::transport::{DEFAULT_ENDPOINT_PATH, TransportMode};

use super::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default handshake timeout (socket open through `CONNECTED`).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for the `RECEIPT` of a graceful `DISCONNECT`.
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-topic broadcast buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// ClientOptions
// ============================================================================

/// Connection and subscription settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Server path joined to the base URL.
    pub endpoint_path: String,

    /// SockJS or raw WebSocket framing.
    pub mode: TransportMode,

    /// STOMP versions offered, in preference order of the server.
    pub protocols: Vec<Protocol>,

    /// Handshake timeout.
    pub connect_timeout: Duration,

    /// Wait for the disconnect receipt.
    pub disconnect_timeout: Duration,

    /// Messages buffered per topic before slow listeners lag.
    pub channel_capacity: usize,

    /// Largest inbound STOMP frame in bytes; larger frames end the session.
    pub max_frame_size: usize,

    /// Reconnect behaviour after a failed handshake or lost session.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            mode: TransportMode::SockJs,
            protocols: vec![Protocol::V12],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the server path.
    #[inline]
    #[must_use]
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// Sets the transport mode.
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the offered STOMP versions.
    #[inline]
    #[must_use]
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols = protocols.into_iter().collect();
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the disconnect receipt timeout.
    #[inline]
    #[must_use]
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Sets the per-topic buffer.
    #[inline]
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Sets the inbound frame size limit.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Checks that the options are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.protocols.is_empty() {
            return Err(Error::config("at least one STOMP protocol must be offered"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::config("channel capacity must be non-zero"));
        }
        if self.max_frame_size == 0 {
            return Err(Error::config("max frame size must be non-zero"));
        }
        self.reconnect.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new();
        assert_eq!(options.endpoint_path, "/websocket/tracker");
        assert_eq!(options.mode, TransportMode::SockJs);
        assert_eq!(options.protocols, vec![Protocol::V12]);
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.channel_capacity, 256);
        assert_eq!(options.max_frame_size, 4 * 1024 * 1024);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let options = ClientOptions::new()
            .with_endpoint_path("/ws")
            .with_mode(TransportMode::WebSocket)
            .with_protocols([Protocol::V11, Protocol::V12])
            .with_channel_capacity(8)
            .with_reconnect(ReconnectPolicy::disabled());

        assert_eq!(options.endpoint_path, "/ws");
        assert_eq!(options.mode, TransportMode::WebSocket);
        assert_eq!(options.protocols.len(), 2);
        assert_eq!(options.channel_capacity, 8);
        assert!(!options.reconnect.enabled);
    }

    #[test]
    fn test_validate_rejects_empty_protocols() {
        let options = ClientOptions::new().with_protocols([]);
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let options = ClientOptions::new().with_channel_capacity(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let options = ClientOptions::new().with_connect_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_frame_size() {
        let options = ClientOptions::new().with_max_frame_size(0);
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("max frame size"));
    }
}
