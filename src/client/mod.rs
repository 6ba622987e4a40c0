//! Tracker client module.
//!
//! This module provides the connection manager and the topic registry
//! behind [`TrackerClient`].
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TrackerClient`] | Facade: connect, disconnect, subscribe |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Timeouts, framing, channel capacity |
//! | [`ReconnectPolicy`] | Backoff and attempt cap |
//! | [`ConnectionManager`] | Session latch and session task |
//! | [`ConnectionState`] | Observable connection state |
//! | [`TopicRegistry`] | Topic → broadcast stream map |
//! | [`Subscription`] | One listener's handle |
//!
//! # Example
//!
//! ```no_run
//! use tracker_link::{Result, TrackerClient, topics};
//!
//! # async fn example() -> Result<()> {
//! let client = TrackerClient::builder()
//!     .base_url("http://localhost:8080")
//!     .build()?;
//!
//! client.connect();
//! let mut events = client.subscribe_to_topic(&topics::events_for("NQ"))?;
//! client.wait_connected().await?;
//!
//! if let Some(batch) = events.recv().await {
//!     println!("{batch}");
//! }
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Connection manager and session task.
pub mod connection;

/// Client facade.
pub mod core;

/// Client options.
pub mod options;

/// Reconnect backoff policy.
pub mod reconnect;

/// Topic registry.
pub mod registry;

/// Subscription handles.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use connection::{ConnectionManager, ConnectionState};
pub use core::TrackerClient;
pub use options::ClientOptions;
pub use reconnect::ReconnectPolicy;
pub use registry::TopicRegistry;
pub use subscription::Subscription;
