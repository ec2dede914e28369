//! # Fanout
//!
//! An in-process publish/subscribe message bus.
//!
//! ## Core Concepts
//!
//! - **Messages**: Immutable envelopes with a process-wide unique id, a topic
//!   and an opaque payload
//! - **Subscriptions**: Regular-expression topic patterns, each with its own
//!   bounded queue
//! - **Broker**: A single dispatch thread fanning inbound messages out to
//!   matching subscribers
//! - **Backpressure**: Every queue is bounded and drops on full; nothing in
//!   the public API blocks
//! - **Composition**: A broker can forward another bus's traffic under a
//!   namespace
//!
//! Set `BUS_DEBUG=y` to get verbose `tracing` diagnostics under the `bus`
//! target.
//!
//! ## Example
//!
//! ```ignore
//! use fanout::{Broker, CancellationToken, Payload};
//!
//! let token = CancellationToken::new();
//! let broker = Broker::new(&token)?;
//!
//! let subscription = broker.subscribe("athome.*");
//! let (accepted, id) = broker.publish("athome.kitchen", Payload::json(&json!({
//!     "lights": "on"
//! }))?);
//!
//! let msg = subscription.recv()?;
//! assert_eq!(msg.id(), id);
//!
//! // Forward another bus under "remote:"
//! broker.connect(&other_broker, "remote")?;
//!
//! token.cancel();
//! ```

pub mod broker;
pub mod cancel;
pub mod debug;
pub mod error;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use broker::{
    namespaced_topic, Broker, BrokerConfig, DispatchState, DEFAULT_INBOUND_CAPACITY,
};
pub use cancel::CancellationToken;
pub use error::{BusError, Result};
pub use subscriptions::{
    CallbackSubscription, Registry, Subscribable, Subscriber, Subscription, TopicPattern,
    Unsubscriber, ANY_TOPIC, DEFAULT_SUBSCRIBER_CAPACITY,
};
pub use types::*;
