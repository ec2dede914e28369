//! Callback-style subscriptions.
//!
//! Each callback subscription owns one thread that waits on either the
//! next message or cancellation, and invokes the handler once per message.

use crate::cancel::CancellationToken;
use crate::debug::bus_debug;
use crate::error::Result;
use crate::types::Message;
use crossbeam_channel::select;
use std::sync::Arc;
use std::thread;

use super::types::{CallbackSubscription, Subscription};

/// Run `handler` for every message of `subscription` on a new thread.
///
/// The thread stops when the subscription's queue is closed or when
/// `parent` (or the returned handle) is cancelled, and unsubscribes on exit.
pub(crate) fn spawn_consumer<F>(
    subscription: Subscription,
    parent: &CancellationToken,
    handler: F,
) -> Result<CallbackSubscription>
where
    F: FnMut(Arc<Message>) + Send + 'static,
{
    let id = subscription.id();
    let token = parent.child_token();
    let worker_token = token.clone();

    // On spawn failure the closure is dropped, and the subscription with it.
    let thread = thread::Builder::new()
        .name(format!("bus-subscriber-{}", id))
        .spawn(move || consume(subscription, worker_token, handler))?;

    Ok(CallbackSubscription::new(id, token, thread))
}

fn consume<F>(subscription: Subscription, token: CancellationToken, mut handler: F)
where
    F: FnMut(Arc<Message>),
{
    loop {
        select! {
            recv(subscription.receiver()) -> msg => match msg {
                Ok(msg) => handler(msg),
                Err(_) => {
                    bus_debug!("stopping subscriber {} (channel closed)", subscription.id());
                    break;
                }
            },
            recv(token.done()) -> _ => {
                bus_debug!("stopping subscriber {} (received quit)", subscription.id());
                break;
            }
        }
    }
    subscription.unsubscribe();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::{Registry, Subscribable};
    use crate::types::Payload;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn message(topic: &str) -> Arc<Message> {
        Arc::new(Message::new(topic, Payload::empty()))
    }

    #[test]
    fn test_handler_receives_messages() {
        let registry = Registry::new();
        let token = CancellationToken::new();
        let (tx, rx) = unbounded();

        let handle = registry
            .subscribe_with_callback(&token, "foo", move |msg| {
                tx.send(msg.topic().to_string()).unwrap();
            })
            .unwrap();

        registry.notify_all(&message("foo"));
        registry.notify_all(&message("bar"));
        registry.notify_all(&message("foo"));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "foo");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "foo");

        handle.cancel();
        handle.join().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_unsubscribes() {
        let registry = Registry::new();
        let token = CancellationToken::new();

        let handle = registry
            .subscribe_with_callback(&token, ".*", |_| {})
            .unwrap();
        assert_eq!(registry.len(), 1);

        handle.cancel();
        handle.cancel();
        handle.join().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parent_token_stops_consumer() {
        let registry = Registry::new();
        let token = CancellationToken::new();

        let handle = registry
            .subscribe_with_callback(&token, ".*", |_| {})
            .unwrap();

        token.cancel();
        handle.join().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_closed_queue_stops_consumer() {
        let registry = Registry::new();
        let token = CancellationToken::new();

        let handle = registry
            .subscribe_with_callback(&token, ".*", |_| {})
            .unwrap();

        registry.remove_all();
        handle.join().unwrap();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_does_not_wait_for_handler() {
        let registry = Registry::new();
        let token = CancellationToken::new();
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();

        let handle = registry
            .subscribe_with_callback(&token, ".*", move |_| {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            })
            .unwrap();

        registry.notify_all(&message("slow"));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // Returns while the handler is still blocked.
        handle.cancel();
        assert!(!handle.is_finished());

        release_tx.send(()).unwrap();
        handle.join().unwrap();
        assert!(registry.is_empty());
    }
}
