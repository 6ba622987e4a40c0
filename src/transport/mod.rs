//! Frame transport layer.
//!
//! A [`Transport`] opens a [`Link`]: a sink accepting STOMP frames and a
//! stream yielding them. The session task in [`crate::client`] drives the
//! STOMP handshake and subscriptions over whatever link it is given.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                           ┌──────────────────┐
//! │  TrackerClient   │          Link             │  Broker          │
//! │  session task    │◄─────────────────────────►│  /websocket/     │
//! │                  │  Frame sink / stream      │  tracker         │
//! └──────────────────┘                           └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | URL building, SockJS ids, access token |
//! | `websocket` | `tokio-tungstenite` implementation (SockJS or raw) |
//! | `memory` | In-process implementation for tests |

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

use crate::error::{Error, Result};
use crate::protocol::Frame;

// ============================================================================
// Submodules
// ============================================================================

/// Tracker endpoint addressing.
pub mod endpoint;

/// In-process transport.
pub mod memory;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{DEFAULT_ENDPOINT_PATH, Endpoint, TransportMode};
pub use memory::{MemoryTransport, ServerLink};
pub use websocket::WebSocketTransport;

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a link.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = Error> + Send>>;

/// Inbound half of a link.
///
/// Ends (`None`) when the peer closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// An open, frame-level connection to the broker.
pub struct Link {
    /// Frames to the broker.
    pub sink: FrameSink,
    /// Frames from the broker.
    pub stream: FrameStream,
}

// ============================================================================
// Transport
// ============================================================================

/// Opens links to a tracker endpoint.
///
/// Called once per handshake attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a new link.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the socket cannot be established.
    async fn open(&self, endpoint: &Endpoint) -> Result<Link>;
}
