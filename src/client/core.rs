//! Tracker client facade.
//!
//! [`TrackerClient`] pairs one [`ConnectionManager`] with one
//! [`TopicRegistry`]. Topics can be subscribed before, during or after the
//! handshake; the session task sends the transport `SUBSCRIBE` once the
//! session is up and again after every reconnect.
//!
//! # Example
//!
//! ```no_run
//! use tracker_link::{TrackerClient, topics};
//!
//! # async fn example() -> tracker_link::Result<()> {
//! let client = TrackerClient::builder()
//!     .base_url("https://tracker.example.com")
//!     .build()?;
//!
//! client.connect();
//! let mut signals = client.subscribe_to_topic(topics::TRADING_SIGNALS)?;
//! client.wait_connected().await?;
//!
//! while let Some(payload) = signals.recv().await {
//!     println!("{payload}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::auth::TokenSource;
use crate::error::Result;
use crate::transport::{Endpoint, Transport};

use super::builder::ClientBuilder;
use super::connection::{ConnectionManager, ConnectionState};
use super::options::ClientOptions;
use super::registry::TopicRegistry;
use super::subscription::Subscription;

// ============================================================================
// TrackerClient
// ============================================================================

/// Multiplexed topic client.
///
/// Cheap to clone; clones share the session and the topic registry.
/// Dropping the last clone ends the session.
#[derive(Clone)]
pub struct TrackerClient {
    manager: ConnectionManager,
    registry: TopicRegistry,
}

impl fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerClient")
            .field("endpoint", &self.manager.endpoint().url().as_str())
            .field("state", &self.manager.state())
            .field("topics", &self.registry.topic_count())
            .finish()
    }
}

impl TrackerClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        endpoint: Endpoint,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        let registry = TopicRegistry::new(options.channel_capacity);
        let manager = ConnectionManager::new(endpoint, options, transport, tokens, registry.clone());
        Self { manager, registry }
    }
}

// ============================================================================
// TrackerClient - Connection
// ============================================================================

impl TrackerClient {
    /// Starts the session. No-op while a session is live or connecting.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[inline]
    pub fn connect(&self) {
        self.manager.connect();
    }

    /// Ends the session and resets the latch. Topic handles stay registered
    /// and are subscribed again on the next `connect()`.
    #[inline]
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Waits until connected, up to the handshake timeout.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::wait_connected`].
    pub async fn wait_connected(&self) -> Result<()> {
        self.manager.wait_connected().await
    }

    /// Waits until connected, up to `limit`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::wait_connected`].
    pub async fn wait_connected_for(&self, limit: Duration) -> Result<()> {
        self.manager.wait_connected_for(limit).await
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Returns a receiver observing state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch_state()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Returns the number of handshakes attempted.
    #[inline]
    #[must_use]
    pub fn handshake_count(&self) -> u64 {
        self.manager.handshake_count()
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        self.manager.endpoint()
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }
}

// ============================================================================
// TrackerClient - Topics
// ============================================================================

impl TrackerClient {
    /// Registers a listener on `topic`.
    ///
    /// The first listener of a topic creates its transport subscription;
    /// later ones share it. Each handle receives payloads published after
    /// it was created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTopic`](crate::Error::InvalidTopic) for an
    /// empty topic.
    pub fn subscribe_to_topic(&self, topic: &str) -> Result<Subscription> {
        self.registry.subscribe(topic)
    }

    /// Tears down `topic` for every listener.
    ///
    /// All streams on the topic end, including those held by other
    /// consumers. To release a single listener drop its [`Subscription`]
    /// instead. Returns `false` if the topic was not registered.
    pub fn unsubscribe_from_topic(&self, topic: &str) -> bool {
        self.registry.unsubscribe_topic(topic)
    }

    /// Returns the topic registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }
}

// ============================================================================
// Tests
// ============================================================================
