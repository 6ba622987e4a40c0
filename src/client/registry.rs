//! Topic registry.
//!
//! Maps topic names to broadcast channels of decoded JSON payloads.
//! Each topic owns exactly one transport subscription id no matter how
//! many listeners hold it. The session task reads [`TopicRegistry::active`]
//! to decide what to `SUBSCRIBE`/`UNSUBSCRIBE`, and routes `MESSAGE`
//! frames through [`TopicRegistry::dispatch`].
//!
//! # Teardown
//!
//! | Call | Effect |
//! |------|--------|
//! | [`Subscription`] drop / `unsubscribe()` | Releases one listener; the topic goes away with the last one |
//! | [`TopicRegistry::unsubscribe_topic`] | Removes the topic now and ends every listener's stream |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::futures::Notified;
use tokio::sync::{Notify, broadcast};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;

use super::subscription::Subscription;

// ============================================================================
// Types
// ============================================================================

/// One registered topic.
struct TopicEntry {
    /// Transport subscription id.
    id: SubscriptionId,
    /// Multicast channel to listeners.
    sender: broadcast::Sender<Value>,
    /// Live [`Subscription`] handles.
    listeners: usize,
}

#[derive(Default)]
struct Table {
    topics: FxHashMap<String, TopicEntry>,
    routes: FxHashMap<SubscriptionId, String>,
}

struct RegistryInner {
    table: Mutex<Table>,
    /// Signalled on every topic added or removed.
    changed: Notify,
    /// Broadcast buffer per topic.
    capacity: usize,
}

// ============================================================================
// TopicRegistry
// ============================================================================

/// Shared topic → stream map.
///
/// Cheap to clone; all clones see the same table.
#[derive(Clone)]
pub struct TopicRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics", &self.topic_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl TopicRegistry {
    /// Creates an empty registry with `capacity` messages buffered per topic.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(Table::default()),
                changed: Notify::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Registers a listener for `topic`.
    ///
    /// The first listener creates the topic entry and its subscription id;
    /// later listeners share both.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTopic`] for an empty topic or one containing NUL.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription> {
        if topic.trim().is_empty() || topic.contains('\0') {
            return Err(Error::invalid_topic(topic));
        }

        let (id, receiver, created) = {
            let mut table = self.inner.table.lock();
            match table.topics.get_mut(topic) {
                Some(entry) => {
                    entry.listeners += 1;
                    (entry.id, entry.sender.subscribe(), false)
                }
                None => {
                    let id = SubscriptionId::next();
                    let (sender, receiver) = broadcast::channel(self.inner.capacity);
                    table.topics.insert(
                        topic.to_string(),
                        TopicEntry {
                            id,
                            sender,
                            listeners: 1,
                        },
                    );
                    table.routes.insert(id, topic.to_string());
                    (id, receiver, true)
                }
            }
        };

        if created {
            debug!(topic, subscription = %id, "Topic registered");
            self.inner.changed.notify_one();
        }

        Ok(Subscription::new(topic.to_string(), id, receiver, self.clone()))
    }

    /// Removes `topic` regardless of how many listeners hold it.
    ///
    /// Every listener's stream ends. Returns `false` if the topic was not
    /// registered.
    pub fn unsubscribe_topic(&self, topic: &str) -> bool {
        let removed = {
            let mut table = self.inner.table.lock();
            let entry = table.topics.remove(topic);
            if let Some(entry) = &entry {
                table.routes.remove(&entry.id);
            }
            entry
        };

        match removed {
            Some(entry) => {
                debug!(
                    topic,
                    subscription = %entry.id,
                    listeners = entry.listeners,
                    "Topic removed"
                );
                drop(entry);
                self.inner.changed.notify_one();
                true
            }
            None => false,
        }
    }

    /// Releases one listener of the entry `id` under `topic`.
    ///
    /// No-op if the topic was removed or replaced since the listener subscribed.
    pub(crate) fn release(&self, topic: &str, id: SubscriptionId) {
        let removed = {
            let mut table = self.inner.table.lock();
            let Some(entry) = table.topics.get_mut(topic) else {
                return;
            };
            if entry.id != id {
                return;
            }
            entry.listeners = entry.listeners.saturating_sub(1);
            if entry.listeners > 0 {
                return;
            }
            table.routes.remove(&id);
            table.topics.remove(topic)
        };

        if removed.is_some() {
            debug!(topic, subscription = %id, "Last listener released topic");
            self.inner.changed.notify_one();
        }
    }

    /// Publishes `payload` to the topic subscribed as `id`.
    ///
    /// Returns the number of listeners that received it.
    pub fn dispatch(&self, id: SubscriptionId, payload: Value) -> usize {
        let table = self.inner.table.lock();
        let Some(entry) = table
            .routes
            .get(&id)
            .and_then(|topic| table.topics.get(topic))
        else {
            return 0;
        };
        entry.sender.send(payload).unwrap_or(0)
    }

    /// Removes every topic, ending all streams. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = {
            let mut table = self.inner.table.lock();
            table.routes.clear();
            table.topics.drain().collect()
        };
        let count = drained.len();
        drop(drained);
        if count > 0 {
            self.inner.changed.notify_one();
        }
        count
    }
}

// ============================================================================
// TopicRegistry - Introspection
// ============================================================================

impl TopicRegistry {
    /// Returns `(id, topic)` for every registered topic, ordered by id.
    #[must_use]
    pub fn active(&self) -> Vec<(SubscriptionId, String)> {
        let table = self.inner.table.lock();
        let mut active: Vec<_> = table
            .topics
            .iter()
            .map(|(topic, entry)| (entry.id, topic.clone()))
            .collect();
        active.sort_unstable_by_key(|(id, _)| *id);
        active
    }

    /// Returns the number of registered topics.
    #[inline]
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.table.lock().topics.len()
    }

    /// Returns the number of live listeners on `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner
            .table
            .lock()
            .topics
            .get(topic)
            .map_or(0, |entry| entry.listeners)
    }

    /// Returns `true` if `topic` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.inner.table.lock().topics.contains_key(topic)
    }

    /// Returns the subscription id of `topic`.
    #[must_use]
    pub fn subscription_id(&self, topic: &str) -> Option<SubscriptionId> {
        self.inner.table.lock().topics.get(topic).map(|e| e.id)
    }

    /// Resolves when the set of topics changes.
    pub(crate) fn changed(&self) -> Notified<'_> {
        self.inner.changed.notified()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_repeat_subscribe_shares_entry() {
        let registry = TopicRegistry::new(16);
        let a = registry.subscribe("/topic/events").unwrap();
        let b = registry.subscribe("/topic/events").unwrap();

        assert_eq!(a.id(), b.id());
        assert_eq!(registry.topic_count(), 1);
        assert_eq!(registry.listener_count("/topic/events"), 2);
        assert_eq!(registry.active(), vec![(a.id(), "/topic/events".to_string())]);
    }

    #[test]
    fn test_rejects_invalid_topic() {
        let registry = TopicRegistry::new(16);
        assert!(matches!(
            registry.subscribe(""),
            Err(Error::InvalidTopic { .. })
        ));
        assert!(registry.subscribe("  ").is_err());
        assert!(registry.subscribe("/topic/\0").is_err());
    }

    #[test]
    fn test_last_release_removes_topic() {
        let registry = TopicRegistry::new(16);
        let a = registry.subscribe("/topic/x").unwrap();
        let b = registry.subscribe("/topic/x").unwrap();

        drop(a);
        assert!(registry.contains("/topic/x"));
        assert_eq!(registry.listener_count("/topic/x"), 1);

        b.unsubscribe();
        assert!(!registry.contains("/topic/x"));
        assert!(registry.active().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_topic_ends_every_listener() {
        let registry = TopicRegistry::new(16);
        let mut a = registry.subscribe("/topic/trading-signals").unwrap();
        let mut b = registry.subscribe("/topic/trading-signals").unwrap();

        assert!(registry.unsubscribe_topic("/topic/trading-signals"));
        assert!(!registry.unsubscribe_topic("/topic/trading-signals"));

        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, None);
    }

    #[test]
    fn test_stale_release_does_not_touch_new_entry() {
        let registry = TopicRegistry::new(16);
        let old = registry.subscribe("/topic/x").unwrap();
        registry.unsubscribe_topic("/topic/x");

        let fresh = registry.subscribe("/topic/x").unwrap();
        assert_ne!(old.id(), fresh.id());

        drop(old);
        assert!(registry.contains("/topic/x"));
        assert_eq!(registry.listener_count("/topic/x"), 1);
        drop(fresh);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_listeners_in_order() {
        let registry = TopicRegistry::new(16);
        let mut a = registry.subscribe("/topic/events").unwrap();
        let mut b = registry.subscribe("/topic/events").unwrap();
        let id = a.id();

        for n in ["A", "B", "C"] {
            assert_eq!(registry.dispatch(id, json!(n)), 2);
        }

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await, Some(json!("A")));
            assert_eq!(sub.recv().await, Some(json!("B")));
            assert_eq!(sub.recv().await, Some(json!("C")));
        }
    }

    #[test]
    fn test_late_listener_misses_earlier_payloads() {
        let registry = TopicRegistry::new(16);
        let mut early = registry.subscribe("/topic/events").unwrap();
        let id = early.id();
        assert_eq!(registry.dispatch(id, json!("before")), 1);

        let mut late = registry.subscribe("/topic/events").unwrap();
        assert_eq!(late.id(), id);
        assert_eq!(registry.dispatch(id, json!("after")), 2);

        assert_eq!(early.try_recv(), Some(json!("before")));
        assert_eq!(early.try_recv(), Some(json!("after")));
        assert_eq!(early.try_recv(), None);

        assert_eq!(late.try_recv(), Some(json!("after")));
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn test_dispatch_unknown_id() {
        let registry = TopicRegistry::new(16);
        assert_eq!(registry.dispatch(SubscriptionId::next(), json!(1)), 0);
    }

    #[test]
    fn test_active_sorted_by_id() {
        let registry = TopicRegistry::new(4);
        let first = registry.subscribe("/topic/b").unwrap();
        let second = registry.subscribe("/topic/a").unwrap();
        let active = registry.active();
        assert_eq!(active[0].0, first.id());
        assert_eq!(active[1].0, second.id());
    }

    #[tokio::test]
    async fn test_clear_ends_streams() {
        let registry = TopicRegistry::new(4);
        let mut a = registry.subscribe("/topic/a").unwrap();
        let _b = registry.subscribe("/topic/b").unwrap();
        assert_eq!(registry.clear(), 2);
        assert_eq!(a.recv().await, None);
        assert_eq!(registry.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_change_notification() {
        let registry = TopicRegistry::new(4);
        let _sub = registry.subscribe("/topic/a").unwrap();
        // notify_one stores a permit when nobody is waiting
        tokio::time::timeout(std::time::Duration::from_secs(1), registry.changed())
            .await
            .expect("change should be signalled");
    }
}
