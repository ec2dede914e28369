//! Subscription system for the message bus.
//!
//! This module provides the subscriber side of the bus:
//! - Regular-expression topic patterns
//! - A concurrency-safe registry of subscribers with bounded queues
//! - Subscription handles and callback subscriptions on their own threads
//!
//! Any type that can hand out subscriptions implements [`Subscribable`],
//! which is what a [`Broker`](crate::Broker) connects to when it forwards
//! another bus's traffic.
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::new();
//! let subscription = registry.subscribe("athome.*");
//!
//! registry.notify_all(&msg);
//!
//! for msg in subscription.iter() {
//!     println!("Got message: {}", msg);
//! }
//! ```

mod callback;
mod pattern;
mod registry;
mod types;

pub(crate) use callback::spawn_consumer;
pub use pattern::{TopicPattern, ANY_TOPIC};
pub use registry::{Registry, Subscriber, DEFAULT_SUBSCRIBER_CAPACITY};
pub use types::{CallbackSubscription, Subscription, Unsubscriber};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::types::{Message, SubscriberId};
use std::sync::Arc;

/// A component that hands out subscriptions to its message stream.
pub trait Subscribable {
    /// Subscribe to topics matching `pattern`, a regular expression that
    /// must match the whole topic.
    fn subscribe(&self, pattern: &str) -> Subscription;

    /// Remove a subscriber. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriberId);

    /// Subscribe and run `handler` for every message on a dedicated thread.
    ///
    /// The thread exits, unsubscribing, when the subscription is closed, when
    /// `token` is cancelled, or when the returned handle is cancelled.
    fn subscribe_with_callback<F>(
        &self,
        token: &CancellationToken,
        pattern: &str,
        handler: F,
    ) -> Result<CallbackSubscription>
    where
        Self: Sized,
        F: FnMut(Arc<Message>) + Send + 'static,
    {
        spawn_consumer(self.subscribe(pattern), token, handler)
    }
}
