//! zbus-backed `BusLink` over the system bus.
//!
//! A dedicated reader thread drains the subscription's message stream
//! into a bounded channel, so `poll_once` is a timed receive and the
//! caller's loop never blocks past its timeout.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use zbus::blocking::{Connection, MessageIterator};
use zbus::MatchRule;

use crate::{BusLink, BusLinkError, LinkState, PollOutcome, Result, SignalMessage};

/// Queue depth between the reader thread and `poll_once`.
const INBOUND_QUEUE: usize = 64;

enum Inbound {
    Signal(SignalMessage),
    Down,
}

/// `BusLink` over the well-known system bus.
pub struct SystemBusLink {
    conn: Option<Connection>,
    inbound: Option<Receiver<Inbound>>,
    reader: Option<std::thread::JoinHandle<()>>,
    state: LinkState,
}

impl SystemBusLink {
    pub fn new() -> Self {
        Self {
            conn: None,
            inbound: None,
            reader: None,
            state: LinkState::Disconnected,
        }
    }
}

impl Default for SystemBusLink {
    fn default() -> Self {
        Self::new()
    }
}

fn read_loop(iter: MessageIterator, tx: Sender<Inbound>) {
    for message in iter {
        match message {
            Ok(msg) => {
                let header = msg.header();
                let signal = SignalMessage {
                    interface: header
                        .interface()
                        .map(|i| i.as_str().to_owned())
                        .unwrap_or_default(),
                    member: header
                        .member()
                        .map(|m| m.as_str().to_owned())
                        .unwrap_or_default(),
                    payload: None,
                };
                if tx.send(Inbound::Signal(signal)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "bus_read_failed");
                let _ = tx.send(Inbound::Down);
                return;
            }
        }
    }
    // Stream end means the connection closed underneath us.
    let _ = tx.send(Inbound::Down);
}

impl BusLink for SystemBusLink {
    fn connect(&mut self) -> Result<()> {
        // A failed connect leaves the link Disconnected; Failed is
        // reserved for a connection that died after it was up.
        let conn = Connection::system().map_err(|e| BusLinkError::Connect(e.to_string()))?;
        self.conn = Some(conn);
        self.state = LinkState::Connected;
        tracing::debug!("system_bus_connected");
        Ok(())
    }

    fn subscribe_signal(&mut self, interface: &str) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(BusLinkError::NotConnected)?;
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .interface(interface)
            .map_err(|e| BusLinkError::Subscribe(e.to_string()))?
            .build();
        let iter = MessageIterator::for_match_rule(rule, conn, Some(INBOUND_QUEUE))
            .map_err(|e| BusLinkError::Subscribe(e.to_string()))?;

        let (tx, rx) = bounded(INBOUND_QUEUE);
        // Joined in close(): the message stream ends once the connection
        // is shut down, which unblocks the reader.
        let reader = std::thread::Builder::new()
            .name("hark-bus-reader".into())
            .spawn(move || read_loop(iter, tx))
            .map_err(|e| BusLinkError::Subscribe(e.to_string()))?;

        self.inbound = Some(rx);
        self.reader = Some(reader);
        tracing::debug!(interface, "signal_subscription_added");
        Ok(())
    }

    fn poll_once(&mut self, timeout: Duration) -> PollOutcome {
        let Some(rx) = self.inbound.as_ref() else {
            return PollOutcome::Idle;
        };
        match rx.recv_timeout(timeout) {
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
        let conn = self.conn.as_ref().ok_or(BusLinkError::NotConnected)?;
        // zbus sends synchronously on the blocking connection; no
        // separate flush step is needed.
        conn.emit_signal(None::<&str>, path, interface, member, &())
            .map_err(|e| BusLinkError::Send(e.to_string()))
    }

    fn close(&mut self) {
        self.inbound = None;
        if let Some(conn) = self.conn.take() {
            // Shut the underlying connection down so the reader's
            // message stream ends even on an idle bus. The inner
            // connection is shared, so shutting down a clone tears
            // down the socket for the iterator too.
            zbus::block_on(conn.inner().clone().graceful_shutdown());
            tracing::debug!("system_bus_closed");
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::error!("bus_reader_panicked");
            }
        }
        if self.state == LinkState::Connected {
            self.state = LinkState::Disconnected;
        }
    }

    fn state(&self) -> LinkState {
        self.state
    }
}
