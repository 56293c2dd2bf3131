//! In-memory `BusLink` for tests and headless development.
//!
//! `LoopbackBus::new` returns the link plus a `LoopbackHandle` that can
//! inject inbound signals, force failures, drop the bus, and inspect
//! everything the link emitted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::{BusLink, BusLinkError, LinkState, PollOutcome, Result, SignalMessage};

enum Inbound {
    Signal(SignalMessage),
    Down,
}

/// A signal recorded by the loopback on `emit_signal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedSignal {
    pub path: String,
    pub interface: String,
    pub member: String,
}

#[derive(Default)]
struct Shared {
    emitted: Mutex<Vec<EmittedSignal>>,
    subscribed: Mutex<Option<String>>,
    refuse_connect: AtomicBool,
    refuse_subscribe: AtomicBool,
    refuse_send: AtomicBool,
}

/// In-memory bus link.
pub struct LoopbackBus {
    shared: Arc<Shared>,
    inbound: Receiver<Inbound>,
    state: LinkState,
}

/// Test-side handle paired with a `LoopbackBus`.
#[derive(Clone)]
pub struct LoopbackHandle {
    shared: Arc<Shared>,
    tx: Sender<Inbound>,
}

impl LoopbackBus {
    pub fn new() -> (Self, LoopbackHandle) {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = unbounded();
        (
            Self {
                shared: shared.clone(),
                inbound: rx,
                state: LinkState::Disconnected,
            },
            LoopbackHandle { shared, tx },
        )
    }
}

impl LoopbackHandle {
    /// Queue an inbound signal as if broadcast on the bus.
    pub fn inject_signal(&self, interface: &str, member: &str) {
        let _ = self.tx.send(Inbound::Signal(SignalMessage {
            interface: interface.to_string(),
            member: member.to_string(),
            payload: None,
        }));
    }

    /// Report the transport as dead on the next poll.
    pub fn drop_bus(&self) {
        let _ = self.tx.send(Inbound::Down);
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.shared.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_subscribe(&self, refuse: bool) {
        self.shared.refuse_subscribe.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_send(&self, refuse: bool) {
        self.shared.refuse_send.store(refuse, Ordering::SeqCst);
    }

    /// All signals the link has emitted, in order.
    pub fn emitted(&self) -> Vec<EmittedSignal> {
        self.shared.emitted.lock().unwrap().clone()
    }

    /// Member names of emitted signals, in order.
    pub fn emitted_members(&self) -> Vec<String> {
        self.shared
            .emitted
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.member.clone())
            .collect()
    }

    /// The interface filter registered by `subscribe_signal`, if any.
    pub fn subscribed_interface(&self) -> Option<String> {
        self.shared.subscribed.lock().unwrap().clone()
    }
}

impl BusLink for LoopbackBus {
    fn connect(&mut self) -> Result<()> {
        if self.shared.refuse_connect.load(Ordering::SeqCst) {
            // Stays Disconnected; Failed is reserved for a bus that
            // died after it was up.
            return Err(BusLinkError::Connect("transport refused".to_string()));
        }
        self.state = LinkState::Connected;
        Ok(())
    }

    fn subscribe_signal(&mut self, interface: &str) -> Result<()> {
        if self.state != LinkState::Connected {
            return Err(BusLinkError::NotConnected);
        }
        if self.shared.refuse_subscribe.load(Ordering::SeqCst) {
            return Err(BusLinkError::Subscribe("match rule rejected".to_string()));
        }
        *self.shared.subscribed.lock().unwrap() = Some(interface.to_string());
        Ok(())
    }

    fn poll_once(&mut self, timeout: Duration) -> PollOutcome {
        match self.inbound.recv_timeout(timeout) {
            Ok(Inbound::Signal(msg)) => PollOutcome::Message(msg),
            Ok(Inbound::Down) | Err(RecvTimeoutError::Disconnected) => {
                self.state = LinkState::Failed;
                PollOutcome::BusDown
            }
            Err(RecvTimeoutError::Timeout) => PollOutcome::Idle,
        }
    }

    fn emit_signal(&mut self, path: &str, interface: &str, member: &str) -> Result<()> {
        if self.state != LinkState::Connected {
            return Err(BusLinkError::NotConnected);
        }
        if self.shared.refuse_send.load(Ordering::SeqCst) {
            return Err(BusLinkError::Send("send rejected".to_string()));
        }
        self.shared.emitted.lock().unwrap().push(EmittedSignal {
            path: path.to_string(),
            interface: interface.to_string(),
            member: member.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.state == LinkState::Connected {
            self.state = LinkState::Disconnected;
        }
    }

    fn state(&self) -> LinkState {
        self.state
    }
}
