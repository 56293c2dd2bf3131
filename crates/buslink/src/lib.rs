//! System-bus link layer for the wake-word bridge.
//!
//! Wraps a single D-Bus connection behind the `BusLink` trait so the
//! detection loop and the state emitter can run against a real system bus
//! or an in-memory loopback in tests. Each consumer owns its own link;
//! links are never shared between the bridge and the emitter.

mod loopback;
pub mod names;
mod system;

pub use loopback::{EmittedSignal, LoopbackBus, LoopbackHandle};
pub use system::SystemBusLink;

use std::time::Duration;

/// Errors from bus link operations.
#[derive(Debug, thiserror::Error)]
pub enum BusLinkError {
    #[error("bus connection failed: {0}")]
    Connect(String),
    #[error("signal subscription rejected: {0}")]
    Subscribe(String),
    #[error("signal send failed: {0}")]
    Send(String),
    #[error("link is not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, BusLinkError>;

/// Connection state of a bus link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Failed,
}

/// One signal read off the bus. Lives for a single poll iteration.
#[derive(Debug, Clone)]
pub struct SignalMessage {
    pub interface: String,
    pub member: String,
    /// Raw body bytes; the bridge ignores trigger payloads.
    pub payload: Option<Vec<u8>>,
}

impl SignalMessage {
    /// True when this message is the named signal on the named interface.
    pub fn is_signal(&self, interface: &str, member: &str) -> bool {
        self.interface == interface && self.member == member
    }
}

/// Outcome of one bounded poll cycle.
#[derive(Debug)]
pub enum PollOutcome {
    /// A pending signal was read.
    Message(SignalMessage),
    /// Nothing queued within the timeout. The normal idle case, not an error.
    Idle,
    /// The transport reports the connection dead. Terminal for this link.
    BusDown,
}

/// A single owned connection to the message bus.
///
/// Contract: `subscribe_signal` and `emit_signal` require a prior
/// successful `connect`; `poll_once` never blocks past its timeout, so a
/// caller polling in a loop stays responsive to its own stop condition.
pub trait BusLink: Send {
    /// Acquire a connection to the bus.
    fn connect(&mut self) -> Result<()>;

    /// Register a match filter restricted to signals on `interface`.
    /// The filter is fixed for the life of the connection.
    fn subscribe_signal(&mut self, interface: &str) -> Result<()>;

    /// One read cycle returning at most one pending signal.
    fn poll_once(&mut self, timeout: Duration) -> PollOutcome;

    /// Broadcast a zero-argument signal and flush before returning, so
    /// delivery is attempted synchronously from the caller's perspective.
    fn emit_signal(&mut self, path: &str, interface: &str, member: &str) -> Result<()>;

    /// Release the connection. Idempotent.
    fn close(&mut self);

    fn state(&self) -> LinkState;
}
