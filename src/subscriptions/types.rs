//! Subscription handles.

use crate::types::{Message, SubscriberId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::registry::Registry;
use crate::cancel::CancellationToken;

/// Capability to remove one subscriber from its registry.
///
/// Cloneable and callable from any thread; calling it more than once is
/// harmless.
#[derive(Clone)]
pub struct Unsubscriber {
    id: SubscriberId,
    registry: Registry,
}

impl Unsubscriber {
    pub(crate) fn new(id: SubscriberId, registry: Registry) -> Self {
        Self { id, registry }
    }

    /// Id of the subscriber this handle removes
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber. Repeated calls are no-ops
    pub fn unsubscribe(&self) {
        self.registry.remove(self.id);
    }
}

impl fmt::Debug for Unsubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsubscriber({})", self.id)
    }
}

/// Handle to a live subscription: the read side of the subscriber's queue
/// plus the capability to remove it.
///
/// The subscriber is removed when the handle is dropped.
pub struct Subscription {
    receiver: Receiver<Arc<Message>>,
    unsubscriber: Unsubscriber,
}

impl Subscription {
    pub(crate) fn new(receiver: Receiver<Arc<Message>>, unsubscriber: Unsubscriber) -> Self {
        Self {
            receiver,
            unsubscriber,
        }
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.unsubscriber.id()
    }

    /// Receive the next message (blocking).
    ///
    /// Fails once the subscription has been closed and drained.
    pub fn recv(&self) -> Result<Arc<Message>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> Result<Arc<Message>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Arc<Message>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator over messages, ending when the subscription closes.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, Arc<Message>> {
        self.receiver.iter()
    }

    /// The underlying queue, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<Arc<Message>> {
        &self.receiver
    }

    /// A detached handle that can unsubscribe from another thread.
    pub fn unsubscriber(&self) -> Unsubscriber {
        self.unsubscriber.clone()
    }

    /// Remove the subscriber and close its queue. Idempotent
    pub fn unsubscribe(&self) {
        self.unsubscriber.unsubscribe();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscriber.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// Handle to a callback subscription running on its own thread.
///
/// Dropping the handle detaches the thread; it keeps running until its
/// queue closes or its token is cancelled.
pub struct CallbackSubscription {
    id: SubscriberId,
    token: CancellationToken,
    thread: JoinHandle<()>,
}

impl CallbackSubscription {
    pub(crate) fn new(id: SubscriberId, token: CancellationToken, thread: JoinHandle<()>) -> Self {
        Self { id, token, thread }
    }

    /// Id of the underlying subscriber
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Ask the consumer thread to stop. Never blocks; idempotent.
    ///
    /// A handler invocation already in progress runs to completion first.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the consumer has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the consumer thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the consumer thread to exit.
    ///
    /// Returns the handler's panic payload if it panicked.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

impl fmt::Debug for CallbackSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSubscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
