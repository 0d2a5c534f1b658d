//! Connection hub: registry of live connections and topic subscriptions, and the fan-out engine
//!
//! Both maps sit behind one `RwLock`. The topic map and each connection's own
//! topic set describe the same relation; every path that changes one side
//! changes the other while the registry write lock is held. Lock order is
//! always registry first, then the connection's own lock.

use log::{debug, error, warn};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::core::connection::{Connection, ConnectionId, TopicId};
use crate::core::queue::Frame;
use crate::error::{HubError, Result};

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Arc<Connection>>,
    topics: HashMap<TopicId, HashSet<ConnectionId>>,
}

impl Registry {
    fn detach(&mut self, id: ConnectionId, topic: TopicId) {
        if let Entry::Occupied(mut entry) = self.topics.entry(topic) {
            entry.get_mut().remove(&id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers whose queue accepted the frame
    pub delivered: usize,
    /// Subscribers torn down because their queue could not accept it
    pub evicted: Vec<ConnectionId>,
}

/// Process-wide registry of live connections; construct one per server and share it
pub struct Hub {
    registry: RwLock<Registry>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Add a connection to the live set.
    ///
    /// A connection that has already been torn down is refused, so a closed
    /// session can never be resurrected. Registering twice is harmless.
    pub fn register(&self, conn: Arc<Connection>) -> Result<bool> {
        let mut registry = self.registry.write()?;
        if conn.is_closed() {
            warn!("Refusing to register closed connection {}", conn.id());
            return Ok(false);
        }
        debug!("Registered connection {} for user {}", conn.id(), conn.user_id());
        registry.connections.insert(conn.id(), conn);
        Ok(true)
    }

    /// Full teardown: remove from the live set and from every topic, prune empty
    /// topics, then close the outbound queue.
    ///
    /// This is the only removal path, shared by explicit disconnects and
    /// backpressure evictions. Returns false if the connection was not registered.
    pub fn unregister(&self, id: ConnectionId) -> Result<bool> {
        let mut registry = self.registry.write()?;
        let Some(conn) = registry.connections.remove(&id) else {
            return Ok(false);
        };

        let topics = conn.clear_topics()?;
        for topic in &topics {
            registry.detach(id, *topic);
        }

        // Still under the lock: a concurrent register sees the closed queue and refuses it
        conn.close();
        debug!(
            "Unregistered connection {} for user {} ({} topics released)",
            id,
            conn.user_id(),
            topics.len()
        );
        Ok(true)
    }

    /// Subscribe a live connection to a topic, updating both sides of the relation
    pub fn subscribe_topic(&self, conn: &Connection, topic: TopicId) -> Result<bool> {
        let mut registry = self.registry.write()?;
        if !registry.connections.contains_key(&conn.id()) {
            return Err(HubError::NotRegistered(conn.id().to_string()));
        }

        let added = conn.subscribe(topic)?;
        registry.topics.entry(topic).or_default().insert(conn.id());
        Ok(added)
    }

    /// Unsubscribe from a topic; unknown topics are a no-op
    pub fn unsubscribe_topic(&self, conn: &Connection, topic: TopicId) -> Result<bool> {
        let mut registry = self.registry.write()?;
        let removed = conn.unsubscribe(topic)?;
        registry.detach(conn.id(), topic);
        Ok(removed)
    }

    /// Queue `payload` for every subscriber of `topic`.
    ///
    /// A subscriber whose queue is full or closed is evicted through
    /// [`Hub::unregister`] before this returns, so one slow reader never holds
    /// up the others and never lingers in a topic set.
    pub fn broadcast(&self, topic: TopicId, payload: Frame) -> Result<BroadcastReport> {
        let mut report = BroadcastReport::default();

        {
            let registry = self.registry.read()?;
            if let Some(subscribers) = registry.topics.get(&topic) {
                for id in subscribers {
                    let Some(conn) = registry.connections.get(id) else {
                        error!("Topic {} references unknown connection {}", topic, id);
                        continue;
                    };
                    match conn.enqueue(payload.clone()) {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            warn!(
                                "Evicting connection {} (user {}) from topic {}: {}",
                                id,
                                conn.user_id(),
                                topic,
                                e
                            );
                            report.evicted.push(*id);
                        }
                    }
                }
            }
        }

        for id in &report.evicted {
            self.unregister(*id)?;
        }

        Ok(report)
    }

    /// Best-effort delivery to every session of `user_id`; drops are tolerated, nobody is evicted
    pub fn notify_user(&self, user_id: &str, payload: Frame) -> Result<usize> {
        let registry = self.registry.read()?;
        let mut delivered = 0;
        for conn in registry.connections.values() {
            if conn.user_id() != user_id {
                continue;
            }
            match conn.enqueue(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Dropped notification for connection {}: {}", conn.id(), e),
            }
        }
        Ok(delivered)
    }

    /// Users currently typing in `topic`, sorted and deduplicated
    pub fn typing_users(&self, topic: TopicId) -> Result<Vec<String>> {
        let registry = self.registry.read()?;
        let mut users = Vec::new();
        if let Some(subscribers) = registry.topics.get(&topic) {
            for id in subscribers {
                if let Some(conn) = registry.connections.get(id) {
                    if conn.is_typing(topic)? {
                        users.push(conn.user_id().to_string());
                    }
                }
            }
        }
        users.sort();
        users.dedup();
        Ok(users)
    }

    /// Connection ids subscribed to `topic`, sorted
    pub fn subscribers(&self, topic: TopicId) -> Result<Vec<ConnectionId>> {
        let registry = self.registry.read()?;
        let mut ids: Vec<ConnectionId> = registry
            .topics
            .get(&topic)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    pub fn is_registered(&self, id: ConnectionId) -> Result<bool> {
        Ok(self.registry.read()?.connections.contains_key(&id))
    }

    pub fn connection_count(&self) -> Result<usize> {
        Ok(self.registry.read()?.connections.len())
    }

    /// Number of topics with at least one subscriber
    pub fn topic_count(&self) -> Result<usize> {
        Ok(self.registry.read()?.topics.len())
    }

    /// Tear down every live connection, used when the hub loop stops
    pub(crate) fn unregister_all(&self) -> Result<usize> {
        let ids: Vec<ConnectionId> = self.registry.read()?.connections.keys().copied().collect();
        let mut removed = 0;
        for id in ids {
            if self.unregister(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn frame(text: &str) -> Frame {
        Arc::from(text)
    }

    fn connect(hub: &Hub, user: &str, capacity: usize) -> (Arc<Connection>, mpsc::Receiver<Frame>) {
        let (conn, rx) = Connection::new(user, capacity);
        let conn = Arc::new(conn);
        assert!(hub.register(conn.clone()).unwrap());
        (conn, rx)
    }

    /// Both sides of the subscription relation agree
    fn assert_consistent(hub: &Hub) {
        let registry = hub.registry.read().unwrap();
        for (topic, subscribers) in &registry.topics {
            assert!(!subscribers.is_empty(), "topic {} kept with no subscribers", topic);
            for id in subscribers {
                let conn = registry.connections.get(id).expect("subscriber is live");
                assert!(conn.is_subscribed(*topic).unwrap());
            }
        }
        for conn in registry.connections.values() {
            for topic in conn.topics().unwrap() {
                assert!(registry.topics[&topic].contains(&conn.id()));
            }
        }
    }

    #[test]
    fn test_broadcast_reaches_only_topic_subscribers() {
        let hub = Hub::new();
        let (a, mut rx_a) = connect(&hub, "alice", 8);
        let (b, mut rx_b) = connect(&hub, "bob", 8);
        let (c, mut rx_c) = connect(&hub, "carol", 8);

        hub.subscribe_topic(&a, 5).unwrap();
        hub.subscribe_topic(&b, 5).unwrap();
        hub.subscribe_topic(&c, 6).unwrap();

        let report = hub.broadcast(5, frame(r#"{"type":"message","chat_id":5}"#)).unwrap();
        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
        assert_consistent(&hub);
    }

    #[test]
    fn test_broadcast_to_empty_topic() {
        let hub = Hub::new();
        let report = hub.broadcast(99, frame("nobody")).unwrap();
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(hub.topic_count().unwrap(), 0);
    }

    #[test]
    fn test_last_unsubscribe_prunes_topic() {
        let hub = Hub::new();
        let (a, _rx_a) = connect(&hub, "alice", 8);
        let (b, _rx_b) = connect(&hub, "bob", 8);

        hub.subscribe_topic(&a, 5).unwrap();
        hub.subscribe_topic(&b, 5).unwrap();
        assert_eq!(hub.topic_count().unwrap(), 1);

        hub.unsubscribe_topic(&a, 5).unwrap();
        assert_eq!(hub.subscribers(5).unwrap(), vec![b.id()]);

        hub.unsubscribe_topic(&b, 5).unwrap();
        assert_eq!(hub.topic_count().unwrap(), 0);

        // Unsubscribing again is a no-op and must not recreate the entry
        assert!(!hub.unsubscribe_topic(&b, 5).unwrap());
        assert_eq!(hub.topic_count().unwrap(), 0);
        assert_consistent(&hub);
    }

    #[test]
    fn test_unregister_releases_every_topic() {
        let hub = Hub::new();
        let (a, _rx_a) = connect(&hub, "alice", 8);
        let (b, _rx_b) = connect(&hub, "bob", 8);

        for topic in [1, 2, 3] {
            hub.subscribe_topic(&a, topic).unwrap();
        }
        hub.subscribe_topic(&b, 2).unwrap();

        assert!(hub.unregister(a.id()).unwrap());
        assert!(a.is_closed());
        assert!(a.topics().unwrap().is_empty());
        assert_eq!(hub.topic_count().unwrap(), 1);
        assert_eq!(hub.subscribers(2).unwrap(), vec![b.id()]);
        assert!(!hub.is_registered(a.id()).unwrap());

        // Second teardown is a no-op
        assert!(!hub.unregister(a.id()).unwrap());
        assert_consistent(&hub);
    }

    #[test]
    fn test_full_queue_evicts_subscriber_everywhere() {
        let hub = Hub::new();
        let (slow, _rx_slow) = connect(&hub, "slow", 1);
        let (fast, mut rx_fast) = connect(&hub, "fast", 8);

        hub.subscribe_topic(&slow, 5).unwrap();
        hub.subscribe_topic(&slow, 6).unwrap();
        hub.subscribe_topic(&fast, 5).unwrap();

        // First frame fills the slow queue, second overflows it
        assert_eq!(hub.broadcast(5, frame("one")).unwrap().delivered, 2);
        let report = hub.broadcast(5, frame("two")).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![slow.id()]);

        assert!(!hub.is_registered(slow.id()).unwrap());
        assert!(slow.is_closed());
        assert!(hub.subscribers(6).unwrap().is_empty());
        assert_eq!(hub.subscribers(5).unwrap(), vec![fast.id()]);

        // Later broadcasts to its old topics never reference it again
        let report = hub.broadcast(6, frame("three")).unwrap();
        assert_eq!(report, BroadcastReport::default());

        assert_eq!(rx_fast.try_recv().as_deref().ok(), Some("one"));
        assert_eq!(rx_fast.try_recv().as_deref().ok(), Some("two"));
        assert_consistent(&hub);
    }

    #[test]
    fn test_closed_connection_cannot_register_or_subscribe() {
        let hub = Hub::new();
        let (conn, _rx) = connect(&hub, "alice", 4);
        hub.unregister(conn.id()).unwrap();

        assert!(!hub.register(conn.clone()).unwrap());
        let err = hub.subscribe_topic(&conn, 1).unwrap_err();
        assert!(matches!(err, HubError::NotRegistered(_)));
        assert!(!conn.is_subscribed(1).unwrap());
        assert_eq!(hub.topic_count().unwrap(), 0);
    }

    #[test]
    fn test_notify_user_reaches_every_session_without_eviction() {
        let hub = Hub::new();
        let (phone, mut rx_phone) = connect(&hub, "alice", 1);
        let (_laptop, mut rx_laptop) = connect(&hub, "alice", 4);
        let (_other, mut rx_other) = connect(&hub, "bob", 4);

        assert_eq!(hub.notify_user("alice", frame("n1")).unwrap(), 2);
        // Phone queue is full now; the drop is tolerated
        assert_eq!(hub.notify_user("alice", frame("n2")).unwrap(), 1);
        assert!(hub.is_registered(phone.id()).unwrap());

        assert_eq!(rx_phone.try_recv().as_deref().ok(), Some("n1"));
        assert_eq!(rx_laptop.try_recv().as_deref().ok(), Some("n1"));
        assert_eq!(rx_laptop.try_recv().as_deref().ok(), Some("n2"));
        assert!(rx_other.try_recv().is_err());
    }

    #[test]
    fn test_typing_users_is_per_connection_and_topic() {
        let hub = Hub::new();
        let (a, _rx_a) = connect(&hub, "alice", 4);
        let (b, _rx_b) = connect(&hub, "bob", 4);

        for conn in [&a, &b] {
            hub.subscribe_topic(conn, 5).unwrap();
            hub.subscribe_topic(conn, 6).unwrap();
        }

        a.set_typing(5, true).unwrap();
        assert_eq!(hub.typing_users(5).unwrap(), vec!["alice".to_string()]);
        assert!(hub.typing_users(6).unwrap().is_empty());
        assert!(!b.is_typing(5).unwrap());

        hub.unsubscribe_topic(&a, 5).unwrap();
        assert!(hub.typing_users(5).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_subscribe_unsubscribe_keeps_relation_consistent() {
        let hub = Arc::new(Hub::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let hub = hub.clone();
            handles.push(std::thread::spawn(move || {
                let (conn, _rx) = Connection::new(format!("user{}", i), 4);
                let conn = Arc::new(conn);
                hub.register(conn.clone()).unwrap();
                for round in 0..50u64 {
                    let topic = round % 4;
                    hub.subscribe_topic(&conn, topic).unwrap();
                    if round % 3 == 0 {
                        hub.unsubscribe_topic(&conn, topic).unwrap();
                    }
                }
                if i % 2 == 0 {
                    hub.unregister(conn.id()).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(hub.connection_count().unwrap(), 4);
        assert_consistent(&hub);
    }

    #[test]
    fn test_unregister_all_closes_everything() {
        let hub = Hub::new();
        let (a, _rx_a) = connect(&hub, "alice", 4);
        let (b, _rx_b) = connect(&hub, "bob", 4);
        hub.subscribe_topic(&a, 1).unwrap();

        assert_eq!(hub.unregister_all().unwrap(), 2);
        assert!(a.is_closed() && b.is_closed());
        assert_eq!(hub.connection_count().unwrap(), 0);
        assert_eq!(hub.topic_count().unwrap(), 0);
    }
}
