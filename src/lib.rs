//! tracker-link - Multiplexed STOMP topic subscriptions for trading dashboards.
//!
//! This library keeps one STOMP-over-SockJS session to a tracker server and
//! shares it between any number of topic listeners.
//!
//! # Architecture
//!
//! The client is split in two halves joined by a change signal:
//!
//! - **Topic registry**: topic name → broadcast stream, one transport
//!   subscription id per topic, reference-counted listeners
//! - **Connection manager**: connect-once latch and a session task that
//!   owns the socket, sends the `SUBSCRIBE`/`UNSUBSCRIBE` difference and
//!   routes `MESSAGE` bodies back to the registry
//!
//! Key design points:
//!
//! - Subscriptions may be taken before the handshake; they are sent once
//!   the session is up
//! - Lost sessions are re-established with exponential backoff and every
//!   active topic is subscribed again
//! - Each client is an independent instance (no process-wide state)
//!
//! # Quick Start
//!
//! ```no_run
//! use tracker_link::{Result, TrackerClient, models::TradingSignal, topics};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = TrackerClient::builder()
//!         .base_url("https://tracker.example.com")
//!         .build()?;
//!
//!     client.connect();
//!     let mut signals = client.subscribe_to_topic(topics::TRADING_SIGNALS)?;
//!     client.wait_connected().await?;
//!
//!     while let Some(batch) = signals.recv_as::<Vec<TradingSignal>>().await? {
//!         println!("{} signals", batch.len());
//!     }
//!
//!     client.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Bearer token sources |
//! | [`client`] | [`TrackerClient`], [`TopicRegistry`], [`ConnectionManager`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`models`] | Dashboard payload types |
//! | [`protocol`] | STOMP frames and SockJS framing |
//! | [`topics`] | Well-known topic names |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Bearer token sources.
///
/// The token is resolved at every handshake and sent as the
/// `access_token` query parameter.
pub mod auth;

/// Connection manager, topic registry and client facade.
///
/// Use [`TrackerClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Dashboard payload types.
pub mod models;

/// STOMP frame codec and SockJS framing.
pub mod protocol;

/// Well-known dashboard topics.
pub mod topics;

/// Transport layer.
///
/// [`Transport`](transport::Transport) implementations opening frame-level links.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Auth types
pub use auth::{EnvToken, StaticToken, TokenSource, TokenStore};

// Client types
pub use client::{
    ClientBuilder, ClientOptions, ConnectionManager, ConnectionState, ReconnectPolicy,
    Subscription, TopicRegistry, TrackerClient,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SubscriptionId;

// Protocol types
pub use protocol::{Command, Frame, Protocol};

// Transport types
pub use transport::{Endpoint, MemoryTransport, Transport, TransportMode, WebSocketTransport};
