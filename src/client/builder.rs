//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`TrackerClient`] instances.
//!
//! # Example
//!
//! ```no_run
//! use tracker_link::TrackerClient;
//!
//! # fn example() -> tracker_link::Result<()> {
//! let client = TrackerClient::builder()
//!     .base_url("https://tracker.example.com")
//!     .token("eyJhbGciOi...")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{StaticToken, TokenSource};
use crate::error::{Error, Result};
use crate::protocol::Protocol;
use crate::transport::{Endpoint, Transport, TransportMode, WebSocketTransport};

use super::core::TrackerClient;
use super::options::ClientOptions;
use super::reconnect::ReconnectPolicy;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`TrackerClient`] instance.
///
/// Use [`TrackerClient::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    /// Server base URL (`http`, `https`, `ws` or `wss`).
    base_url: Option<String>,
    /// Connection settings.
    options: ClientOptions,
    /// Transport override; WebSocket when unset.
    transport: Option<Arc<dyn Transport>>,
    /// Bearer token source.
    tokens: Option<Arc<dyn TokenSource>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .field("custom_transport", &self.transport.is_some())
            .field("has_token_source", &self.tokens.is_some())
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL, e.g. `https://tracker.example.com/app`.
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the server path (default `/websocket/tracker`).
    #[inline]
    #[must_use]
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.options.endpoint_path = path.into();
        self
    }

    /// Selects SockJS or raw WebSocket framing.
    #[inline]
    #[must_use]
    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Sets the offered STOMP versions.
    #[inline]
    #[must_use]
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.options.protocols = protocols.into_iter().collect();
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.options.reconnect = policy;
        self
    }

    /// Sets the per-topic buffer.
    #[inline]
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.options.channel_capacity = capacity;
        self
    }

    /// Sets the inbound frame size limit in bytes.
    #[inline]
    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.options.max_frame_size = bytes;
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses a custom transport instead of the WebSocket one.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Resolves the bearer token from `source` at every handshake.
    #[inline]
    #[must_use]
    pub fn token_source(mut self, source: impl TokenSource + 'static) -> Self {
        self.tokens = Some(Arc::new(source));
        self
    }

    /// Uses a fixed bearer token.
    #[inline]
    #[must_use]
    pub fn token(self, token: impl Into<String>) -> Self {
        self.token_source(StaticToken::new(token))
    }

    /// Builds the client with validation.
    ///
    /// No connection is made; call [`TrackerClient::connect`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the base URL is missing or an option is invalid
    /// - [`Error::Url`] if the base URL does not parse
    pub fn build(self) -> Result<TrackerClient> {
        let endpoint = self.validate_endpoint()?;
        self.options.validate()?;

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(
                WebSocketTransport::new(self.options.protocols.clone())
                    .with_max_frame_size(self.options.max_frame_size),
            )
        });

        Ok(TrackerClient::new(
            endpoint,
            self.options,
            transport,
            self.tokens,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the base URL and joins the server path.
    fn validate_endpoint(&self) -> Result<Endpoint> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            Error::config(
                "Base URL is required. Use .base_url() to set it.\n\
                 Example: TrackerClient::builder().base_url(\"https://tracker.example.com\")",
            )
        })?;

        Ok(Endpoint::new(base_url, &self.options.endpoint_path)?.with_mode(self.options.mode))
    }
}

// ============================================================================
// Tests
// ============================================================================
