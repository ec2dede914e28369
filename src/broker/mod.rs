//! The broker: owns the inbound queue, the registry and the dispatch thread.

mod dispatch;
mod forward;

pub use dispatch::DispatchState;
pub use forward::namespaced_topic;

use crate::cancel::CancellationToken;
use crate::debug::bus_debug;
use crate::error::Result;
use crate::subscriptions::{
    spawn_consumer, CallbackSubscription, Registry, Subscribable, Subscription, Unsubscriber,
    DEFAULT_SUBSCRIBER_CAPACITY,
};
use crate::types::{Message, MessageId, Payload, SubscriberId};
use crossbeam_channel::{bounded, Sender};
use dispatch::Dispatcher;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default capacity of a broker's inbound queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 10;

/// Broker configuration.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Messages that may wait for dispatch before `publish` starts dropping.
    /// Default: 10
    pub inbound_capacity: usize,

    /// Messages buffered per subscriber before deliveries to it are dropped.
    /// Default: 10
    pub subscriber_capacity: usize,

    /// Name of the dispatch thread.
    pub thread_name: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            thread_name: "bus-dispatch".to_string(),
        }
    }
}

/// In-process publish/subscribe broker.
///
/// Publishing never blocks: messages go onto a bounded inbound queue and are
/// dropped when it is full. A single dispatch thread fans each message out
/// to every subscriber whose pattern matches, again dropping on full queues,
/// so a slow subscriber only ever loses its own messages.
///
/// The broker stops when the token it was created with is cancelled, when
/// [`Broker::close`] is called, or when it is dropped. Once stopped it stays
/// stopped.
pub struct Broker {
    config: BrokerConfig,

    registry: Registry,

    /// Producer side of the inbound queue. Forwarders hold clones.
    inbound: Sender<Arc<Message>>,

    /// Child of the construction token; cancelled on close.
    shutdown: CancellationToken,

    dispatcher: Mutex<Option<JoinHandle<()>>>,

    /// Forwarding subscriptions on upstream buses made by `connect`.
    connections: Mutex<Vec<CallbackSubscription>>,
}

impl Broker {
    /// Create a broker with the default configuration and start dispatching.
    pub fn new(token: &CancellationToken) -> Result<Self> {
        Self::with_config(token, BrokerConfig::default())
    }

    /// Create a broker with a custom configuration and start dispatching.
    pub fn with_config(token: &CancellationToken, config: BrokerConfig) -> Result<Self> {
        let registry = Registry::with_capacity(config.subscriber_capacity);
        let (inbound, receiver) = bounded(config.inbound_capacity);
        let shutdown = token.child_token();

        let dispatcher = Dispatcher::new(registry.clone(), receiver, shutdown.clone());
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || dispatcher.run())?;

        Ok(Self {
            config,
            registry,
            inbound,
            shutdown,
            dispatcher: Mutex::new(Some(handle)),
            connections: Mutex::new(Vec::new()),
        })
    }

    // --- Publishing ---

    /// Publish a message for fan-out. Never blocks.
    ///
    /// Returns whether the message was accepted, and its id. The id is
    /// allocated even when the message is dropped because the inbound queue
    /// is full or the broker has stopped.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Payload>) -> (bool, MessageId) {
        let msg = Message::new(topic, payload.into());
        let id = msg.id();
        if self.shutdown.is_cancelled() {
            bus_debug!("broker stopped, discarded {}", id);
            return (false, id);
        }
        (forward::accept(&self.inbound, msg), id)
    }

    // --- Subscribing ---

    /// Subscribe to topics fully matching the regular expression `pattern`.
    ///
    /// A pattern that is not a valid regular expression is accepted but
    /// never matches.
    pub fn subscribe(&self, pattern: &str) -> Subscription {
        let (id, receiver) = self.registry.add(pattern);
        Subscription::new(receiver, Unsubscriber::new(id, self.registry.clone()))
    }

    /// Subscribe and run `handler` for every message on a dedicated thread.
    ///
    /// The thread exits, unsubscribing, when `token` or the returned handle
    /// is cancelled, or when the broker closes the subscription.
    pub fn subscribe_with_callback<F>(
        &self,
        token: &CancellationToken,
        pattern: &str,
        handler: F,
    ) -> Result<CallbackSubscription>
    where
        F: FnMut(Arc<Message>) + Send + 'static,
    {
        spawn_consumer(self.subscribe(pattern), token, handler)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.registry.remove(id);
    }

    /// Remove every subscriber.
    pub fn unsubscribe_all(&self) {
        self.registry.remove_all();
    }

    // --- Composition ---

    /// Forward everything published on `upstream` into this broker.
    ///
    /// Topics are prefixed with `namespace` and [`TOPIC_SEPARATOR`]
    /// (unchanged if `namespace` is empty); message ids are kept. Forwarded
    /// messages go through the same non-blocking path as `publish`.
    ///
    /// Returns the id of the subscription on `upstream`, usable with
    /// [`Broker::disconnect`]. Forwarding ends when this broker stops.
    ///
    /// [`TOPIC_SEPARATOR`]: crate::TOPIC_SEPARATOR
    pub fn connect(&self, upstream: &dyn Subscribable, namespace: &str) -> Result<SubscriberId> {
        let connection = forward::forward(upstream, self.inbound.clone(), namespace, &self.shutdown)?;
        let id = connection.id();
        let mut connections = self.connections.lock();
        // Forwarders from upstreams that have since stopped are gone.
        connections.retain(|c| !c.is_finished());
        connections.push(connection);
        Ok(id)
    }

    /// Stop forwarding from a connected upstream. Returns false for unknown ids.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let mut connections = self.connections.lock();
        match connections.iter().position(|c| c.id() == id) {
            Some(index) => {
                connections.swap_remove(index).cancel();
                true
            }
            None => false,
        }
    }

    // --- Lifecycle ---

    /// Stop the broker. Idempotent and non-blocking.
    ///
    /// The dispatch thread notices at its next wakeup, abandons queued
    /// messages and closes every subscriber.
    pub fn close(&self) {
        bus_debug!("closing broker");
        self.shutdown.cancel();
        for connection in self.connections.lock().drain(..) {
            connection.cancel();
        }
    }

    /// Wait for the dispatch thread to exit. Call after [`Broker::close`] or
    /// after cancelling the construction token.
    pub fn join(&self) {
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(target: "bus", "dispatch thread panicked");
            }
        }
    }

    /// Whether the dispatch loop is still running.
    pub fn state(&self) -> DispatchState {
        match &*self.dispatcher.lock() {
            Some(handle) if !handle.is_finished() && !self.shutdown.is_cancelled() => {
                DispatchState::Running
            }
            _ => DispatchState::Stopped,
        }
    }

    /// Whether the state is [`DispatchState::Running`]
    pub fn is_running(&self) -> bool {
        self.state() == DispatchState::Running
    }

    // --- Introspection ---

    /// Configuration the broker was built with
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// The broker's subscriber registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Messages accepted but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Number of upstream forwarders that are still running.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().iter().filter(|c| !c.is_finished()).count()
    }
}

impl Subscribable for Broker {
    fn subscribe(&self, pattern: &str) -> Subscription {
        Broker::subscribe(self, pattern)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        Broker::unsubscribe(self, id);
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.close();
    }
}
