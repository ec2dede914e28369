//! Registry of active subscribers.

use crate::debug::bus_debug;
use crate::types::{Message, SubscriberId};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::pattern::TopicPattern;
use super::types::{Subscription, Unsubscriber};
use super::Subscribable;

/// Default capacity of each subscriber's output queue.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 10;

/// A single listener: a topic pattern and the sending half of its queue.
pub struct Subscriber {
    id: SubscriberId,
    pattern: TopicPattern,
    /// `None` once closed.
    sender: Option<Sender<Arc<Message>>>,
}

impl Subscriber {
    fn new(
        id: SubscriberId,
        pattern: TopicPattern,
        capacity: usize,
    ) -> (Self, Receiver<Arc<Message>>) {
        let (sender, receiver) = bounded(capacity);
        let subscriber = Self {
            id,
            pattern,
            sender: Some(sender),
        };
        (subscriber, receiver)
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Topic pattern this subscriber listens on
    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    /// Try to enqueue a message without blocking.
    ///
    /// Returns false if the queue is full (the message is dropped), the
    /// reader went away, or the subscriber is closed.
    pub fn deliver(&self, msg: &Arc<Message>) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(Arc::clone(msg)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                bus_debug!("buffer of subscriber {} full, {} not delivered", self.id, msg.id());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Whether `topic` fully matches this subscriber's pattern
    pub fn matches(&self, topic: &str) -> bool {
        self.pattern.matches(topic)
    }

    /// Close the output queue so readers see end-of-stream once it drains.
    ///
    /// Safe to call more than once; only the first call has an effect.
    /// Returns whether this call closed the queue.
    pub fn close(&mut self) -> bool {
        self.sender.take().is_some()
    }

    /// Whether the output queue has been closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

/// Registry contents, guarded by one lock so closing and registering
/// cannot interleave.
#[derive(Default)]
pub(crate) struct Entries {
    subscribers: HashMap<SubscriberId, Subscriber>,
    /// Set once by [`Registry::close`]; no subscriber is kept afterwards.
    closed: bool,
}


/// Concurrency-safe collection of subscribers keyed by id.
///
/// Cloning is cheap and yields a handle to the same registry. Any component
/// that wants bus capability without a dispatch thread can hold one and call
/// [`Registry::notify_all`] itself.
///
/// A registry can be closed for good with [`Registry::close`]. After that,
/// new subscribers are handed a queue that is already at end-of-stream.
#[derive(Clone)]
pub struct Registry {
    entries: Arc<RwLock<Entries>>,
    capacity: usize,
}

impl Registry {
    /// Create a registry whose subscribers get the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a registry with a custom per-subscriber queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            capacity,
        }
    }

    /// Register a new subscriber and return its id and queue.
    ///
    /// On a closed registry the subscriber is not kept and its queue is
    /// returned already closed.
    pub fn add(&self, pattern: impl Into<TopicPattern>) -> (SubscriberId, Receiver<Arc<Message>>) {
        let pattern = pattern.into();
        bus_debug!("subscribe '{}'", pattern);

        let id = SubscriberId::next();
        let (mut subscriber, receiver) = Subscriber::new(id, pattern, self.capacity);

        let mut entries = self.entries.write();
        if entries.closed {
            drop(entries);
            bus_debug!("registry closed, subscriber {} closed on arrival", id);
            subscriber.close();
        } else {
            entries.subscribers.insert(id, subscriber);
        }

        (id, receiver)
    }

    /// Close and remove a subscriber. Unknown ids are ignored.
    ///
    /// Returns whether the subscriber was present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.entries.write().subscribers.remove(&id);
        match removed {
            Some(mut subscriber) => {
                subscriber.close();
                true
            }
            None => false,
        }
    }

    /// Close and remove every subscriber. Returns how many were removed.
    ///
    /// The registry stays open for new subscribers.
    pub fn remove_all(&self) -> usize {
        self.drain(false)
    }

    /// Close and remove every subscriber, and close every subscriber
    /// registered from now on. Returns how many were removed.
    pub fn close(&self) -> usize {
        self.drain(true)
    }

    /// Whether [`Registry::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.entries.read().closed
    }

    fn drain(&self, close: bool) -> usize {
        let drained: Vec<Subscriber> = {
            let mut entries = self.entries.write();
            entries.closed |= close;
            entries.subscribers.drain().map(|(_, subscriber)| subscriber).collect()
        };

        let count = drained.len();
        for mut subscriber in drained {
            subscriber.close();
        }
        count
    }

    /// Call `f` for every subscriber whose pattern matches `topic`.
    ///
    /// Holds the read lock for the whole scan, so registrations and
    /// removals wait until it is done.
    pub fn for_each_matching<F>(&self, topic: &str, mut f: F)
    where
        F: FnMut(&Subscriber),
    {
        let entries = self.entries.read();
        for subscriber in entries.subscribers.values() {
            if subscriber.matches(topic) {
                f(subscriber);
            }
        }
    }

    /// Deliver a message to every matching subscriber.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn notify_all(&self, msg: &Arc<Message>) -> usize {
        let mut delivered = 0;
        self.for_each_matching(msg.topic(), |subscriber| {
            bus_debug!("notify {} => subscriber {}", msg.id(), subscriber.id());
            if subscriber.deliver(msg) {
                delivered += 1;
            }
        });
        delivered
    }

    /// Whether a subscriber with this id is registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.read().subscribers.contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.entries.read().subscribers.len()
    }

    /// Whether no subscriber is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().subscribers.is_empty()
    }

    /// Per-subscriber queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stall every fan-out until the guard is dropped.
    #[cfg(test)]
    pub(crate) fn stall(&self) -> parking_lot::RwLockWriteGuard<'_, Entries> {
        self.entries.write()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscribable for Registry {
    fn subscribe(&self, pattern: &str) -> Subscription {
        let (id, receiver) = self.add(pattern);
        Subscription::new(receiver, Unsubscriber::new(id, self.clone()))
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.remove(id);
    }
}
