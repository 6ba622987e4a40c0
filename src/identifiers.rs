//! Type-safe identifiers.
//!
//! Newtype wrappers keep transport subscription ids and session
//! generations from being mixed with plain integers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Counters
// ============================================================================

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifier of one transport-level STOMP subscription.
///
/// Rendered as `sub-N` in the `id` header of `SUBSCRIBE`/`UNSUBSCRIBE`
/// and matched against the `subscription` header of `MESSAGE` frames.
/// Ids are process-unique, so a topic that is torn down and subscribed
/// again always gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocates the next unique id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    /// Parses the `sub-N` wire form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        value
            .strip_prefix("sub-")
            .and_then(|n| n.parse::<u64>().ok())
            .map(Self)
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// SessionGeneration
// ============================================================================

/// Monotonic number of a connect/disconnect cycle within one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionGeneration(pub(crate) u64);

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
