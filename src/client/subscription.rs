//! Subscription handles.
//!
//! A [`Subscription`] is one listener on a topic. Several handles on the
//! same topic share a single transport subscription; each handle sees
//! every message published after it was created, in arrival order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::Stream;
use futures_util::stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::error::Result;
use crate::identifiers::SubscriptionId;

use super::registry::TopicRegistry;

// ============================================================================
// Subscription
// ============================================================================

/// Live stream of JSON payloads for one topic.
///
/// Dropping the handle releases it; the transport subscription is torn
/// down when the last handle on the topic goes away.
pub struct Subscription {
    topic: String,
    id: SubscriptionId,
    receiver: broadcast::Receiver<Value>,
    registry: TopicRegistry,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        topic: String,
        id: SubscriptionId,
        receiver: broadcast::Receiver<Value>,
        registry: TopicRegistry,
    ) -> Self {
        Self {
            topic,
            id,
            receiver,
            registry,
        }
    }

    /// Returns the topic name.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the transport subscription id shared by the topic.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

// ============================================================================
// Receiving
// ============================================================================

impl Subscription {
    /// Waits for the next payload.
    ///
    /// Returns `None` once the topic has been unsubscribed. A listener that
    /// falls more than the channel capacity behind skips the missed
    /// payloads and keeps going.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Subscriber lagged, payloads dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Waits for the next payload and deserializes it into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload does not
    /// match `T`.
    pub async fn recv_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.recv().await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns a payload that already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Subscriber lagged, payloads dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Converts the handle into a [`Stream`] of payloads.
    ///
    /// The stream keeps the listener registered until it is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Value> + Send + Unpin + 'static {
        Box::pin(stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|value| (value, sub))
        }))
    }

    /// Releases this listener.
    ///
    /// Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(&self.topic, self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::StreamExt;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tick {
        price: f64,
    }

    #[tokio::test]
    async fn test_recv_as_typed() {
        let registry = TopicRegistry::new(8);
        let mut sub = registry.subscribe("/topic/ticks").unwrap();
        registry.dispatch(sub.id(), json!({"price": 1.5}));

        let tick: Option<Tick> = sub.recv_as().await.unwrap();
        assert_eq!(tick, Some(Tick { price: 1.5 }));
    }

    #[tokio::test]
    async fn test_recv_as_mismatch() {
        let registry = TopicRegistry::new(8);
        let mut sub = registry.subscribe("/topic/ticks").unwrap();
        registry.dispatch(sub.id(), json!("not a tick"));
        assert!(sub.recv_as::<Tick>().await.is_err());
    }

    #[tokio::test]
    async fn test_lagged_listener_skips_ahead() {
        let registry = TopicRegistry::new(2);
        let mut sub = registry.subscribe("/topic/fast").unwrap();
        for n in 0..5 {
            registry.dispatch(sub.id(), json!(n));
        }
        assert_eq!(sub.recv().await, Some(json!(3)));
        assert_eq!(sub.recv().await, Some(json!(4)));
    }

    #[test]
    fn test_try_recv() {
        let registry = TopicRegistry::new(8);
        let mut sub = registry.subscribe("/topic/x").unwrap();
        assert_eq!(sub.try_recv(), None);
        registry.dispatch(sub.id(), json!(true));
        assert_eq!(sub.try_recv(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_into_stream_ends_on_teardown() {
        let registry = TopicRegistry::new(8);
        let sub = registry.subscribe("/topic/x").unwrap();
        let id = sub.id();
        let mut stream = sub.into_stream();

        registry.dispatch(id, json!(1));
        assert_eq!(stream.next().await, Some(json!(1)));

        registry.unsubscribe_topic("/topic/x");
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_debug_shows_topic() {
        let registry = TopicRegistry::new(8);
        let sub = registry.subscribe("/topic/x").unwrap();
        assert!(format!("{sub:?}").contains("/topic/x"));
    }

    #[test]
    fn test_unsubscribe_then_recv_outside_runtime() {
        let registry = TopicRegistry::new(8);
        let mut sub = registry.subscribe("/topic/ticks").unwrap();
        registry.dispatch(sub.id(), json!({"price": 2.0}));

        let first = tokio_test::block_on(sub.recv());
        assert_eq!(first, Some(json!({"price": 2.0})));

        sub.unsubscribe();
        assert!(!registry.contains("/topic/ticks"));
    }
}
