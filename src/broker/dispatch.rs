//! The broker's dispatch loop.
//!
//! Exactly one dispatcher reads a broker's inbound queue, so the fan-out of
//! one message never interleaves with another. The loop is a two-state
//! machine:
//!
//! - `Running`: wait for either the next inbound message or shutdown. A
//!   message is fanned out to the registry and the loop stays running.
//! - `Stopped`: terminal. Entered on shutdown (or when every inbound sender
//!   is gone). Messages still queued are abandoned and every subscriber is
//!   closed.

use crate::cancel::CancellationToken;
use crate::debug::bus_debug;
use crate::subscriptions::Registry;
use crate::types::Message;
use crossbeam_channel::{select, Receiver};
use std::sync::Arc;

/// Lifecycle state of a dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    Stopped,
}

enum Event {
    Message(Arc<Message>),
    Disconnected,
    Shutdown,
}

pub(crate) struct Dispatcher {
    registry: Registry,
    inbound: Receiver<Arc<Message>>,
    shutdown: CancellationToken,
    state: DispatchState,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Registry,
        inbound: Receiver<Arc<Message>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            inbound,
            shutdown,
            state: DispatchState::Running,
        }
    }

    /// Run until stopped.
    pub(crate) fn run(mut self) {
        while self.step() == DispatchState::Running {}
    }

    /// Wait for one event and apply it.
    pub(crate) fn step(&mut self) -> DispatchState {
        if self.state == DispatchState::Stopped {
            return self.state;
        }

        let event = select! {
            recv(self.inbound) -> msg => match msg {
                Ok(msg) => Event::Message(msg),
                Err(_) => Event::Disconnected,
            },
            recv(self.shutdown.done()) -> _ => Event::Shutdown,
        };

        match event {
            Event::Message(msg) => {
                self.registry.notify_all(&msg);
            }
            Event::Disconnected => self.stop("inbound queue disconnected"),
            Event::Shutdown => self.stop("received quit"),
        }

        self.state
    }

    fn stop(&mut self, reason: &str) {
        bus_debug!("closing message broker ({})...", reason);
        let closed = self.registry.close();
        bus_debug!("closed {} subscribers", closed);
        self.state = DispatchState::Stopped;
    }
}
