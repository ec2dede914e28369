//! Forwarding between brokers.

use crate::cancel::CancellationToken;
use crate::debug::bus_debug;
use crate::error::Result;
use crate::subscriptions::{spawn_consumer, CallbackSubscription, Subscribable, ANY_TOPIC};
use crate::types::{Message, TOPIC_SEPARATOR};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;

/// Put a message on an inbound queue without blocking.
///
/// Returns false, dropping the message, if the queue is full or its
/// dispatcher has stopped.
pub(crate) fn accept(inbound: &Sender<Arc<Message>>, msg: Message) -> bool {
    let id = msg.id();
    match inbound.try_send(Arc::new(msg)) {
        Ok(()) => {
            bus_debug!("accept {}", id);
            true
        }
        Err(TrySendError::Full(_)) => {
            bus_debug!("buffer full, discarded {}", id);
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            bus_debug!("broker stopped, discarded {}", id);
            false
        }
    }
}

/// Topic a forwarded message gets under `namespace`.
pub fn namespaced_topic(namespace: &str, topic: &str) -> String {
    if namespace.is_empty() {
        topic.to_string()
    } else {
        format!("{}{}{}", namespace, TOPIC_SEPARATOR, topic)
    }
}

/// Subscribe to everything on `upstream` and re-accept it into `inbound`
/// under `namespace`, keeping message ids.
pub(crate) fn forward(
    upstream: &dyn Subscribable,
    inbound: Sender<Arc<Message>>,
    namespace: &str,
    token: &CancellationToken,
) -> Result<CallbackSubscription> {
    bus_debug!("connect onto '{}'", namespace);

    let namespace = namespace.to_string();
    spawn_consumer(upstream.subscribe(ANY_TOPIC), token, move |msg| {
        bus_debug!("forward {} => '{}'", msg.id(), namespace);
        // The upstream message is shared with other subscribers; forward a copy.
        let forwarded = msg.with_topic(namespaced_topic(&namespace, msg.topic()));
        accept(&inbound, forwarded);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;
    use crossbeam_channel::bounded;

    #[test]
    fn test_namespaced_topic() {
        assert_eq!(namespaced_topic("ns", "foo"), "ns:foo");
        assert_eq!(namespaced_topic("a:b", "c.d"), "a:b:c.d");
        assert_eq!(namespaced_topic("", "foo"), "foo");
    }

    #[test]
    fn test_accept_full_queue() {
        let (tx, rx) = bounded(1);
        assert!(accept(&tx, Message::new("a", Payload::empty())));
        assert!(!accept(&tx, Message::new("b", Payload::empty())));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_accept_disconnected() {
        let (tx, rx) = bounded(1);
        drop(rx);
        assert!(!accept(&tx, Message::new("a", Payload::empty())));
    }
}
