//! Wire protocol types.
//!
//! This module defines the STOMP frames exchanged with the tracker broker
//! and the SockJS framing that wraps them on the WebSocket.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `CONNECT` | Client → Broker | Open a STOMP session |
//! | `CONNECTED` | Broker → Client | Handshake accepted |
//! | `SUBSCRIBE` / `UNSUBSCRIBE` | Client → Broker | Topic lifecycle |
//! | `MESSAGE` | Broker → Client | Pushed JSON payload |
//! | `DISCONNECT` / `RECEIPT` | Both | Graceful close |
//! | `ERROR` | Broker → Client | Fatal session error |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | STOMP frame model, encoder and decoder |
//! | `sockjs` | SockJS message framing |
//! | `version` | Protocol versions and subprotocol names |

// ============================================================================
// Submodules
// ============================================================================

/// STOMP frame model and codec.
pub mod frame;

/// SockJS message framing.
pub mod sockjs;

/// STOMP protocol versions.
pub mod version;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{Command, DEFAULT_MAX_FRAME_SIZE, Frame, FrameDecoder};
pub use sockjs::SockJsFrame;
pub use version::Protocol;
