//! Mirrors local assistant state onto the system bus.
//!
//! The inverse direction of the detection bridge: dialog and connectivity
//! transitions become zero-argument signals external listeners (LED
//! rings, the detector engine) react to. Emission is best-effort; an
//! unreachable listener must never destabilize the voice pipeline.

use hark_buslink::{names, BusLink, Result};
use serde::Serialize;

/// Dialog state of the voice interaction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

/// Connectivity to the assistant backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Disconnected,
    Pending,
    Connected,
}

/// Emits state-change signals on its own bus link, synchronously on the
/// caller's thread. Duplicate consecutive states are suppressed.
pub struct StateSignalEmitter {
    link: Box<dyn BusLink>,
    last_dialog: Option<DialogState>,
    last_connectivity: Option<ConnectivityState>,
}

impl StateSignalEmitter {
    /// Connects the given link. The emitter never shares the detection
    /// bridge's connection; it owns an independent one.
    pub fn new(mut link: Box<dyn BusLink>) -> Result<Self> {
        link.connect()?;
        Ok(Self {
            link,
            last_dialog: None,
            last_connectivity: None,
        })
    }

    /// Report a dialog transition. Repeats of the current state emit
    /// nothing.
    pub fn on_dialog_state(&mut self, state: DialogState) {
        if self.last_dialog == Some(state) {
            return;
        }
        self.last_dialog = Some(state);

        let member = match state {
            DialogState::Idle => names::ON_IDLE,
            DialogState::Listening => names::ON_LISTEN,
            DialogState::Thinking => names::ON_THINK,
            DialogState::Speaking => names::ON_SPEAK,
        };
        self.emit(member);
    }

    /// Report a connectivity transition. Repeats of the current state
    /// emit nothing.
    pub fn on_connectivity(&mut self, state: ConnectivityState) {
        if self.last_connectivity == Some(state) {
            return;
        }
        self.last_connectivity = Some(state);

        let member = match state {
            ConnectivityState::Disconnected | ConnectivityState::Pending => names::CONNECTING,
            ConnectivityState::Connected => names::READY,
        };
        self.emit(member);
    }

    // Best-effort: failures are logged and swallowed.
    fn emit(&mut self, member: &str) {
        tracing::info!(member, "state_signal");
        if let Err(e) =
            self.link
                .emit_signal(names::DETECTOR_PATH, names::DETECTOR_INTERFACE, member)
        {
            tracing::warn!(member, error = %e, "state_signal_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_buslink::{BusLinkError, LoopbackBus, LoopbackHandle};

    fn create_emitter() -> (StateSignalEmitter, LoopbackHandle) {
        let (bus, handle) = LoopbackBus::new();
        let emitter = StateSignalEmitter::new(Box::new(bus)).unwrap();
        (emitter, handle)
    }

    #[test]
    fn test_dialog_transitions_map_to_members() {
        let (mut emitter, handle) = create_emitter();

        emitter.on_dialog_state(DialogState::Idle);
        emitter.on_dialog_state(DialogState::Listening);
        emitter.on_dialog_state(DialogState::Thinking);
        emitter.on_dialog_state(DialogState::Speaking);

        assert_eq!(
            handle.emitted_members(),
            vec!["on_idle", "on_listen", "on_think", "on_speak"]
        );
    }

    #[test]
    fn test_duplicate_dialog_states_suppressed() {
        let (mut emitter, handle) = create_emitter();

        for state in [
            DialogState::Idle,
            DialogState::Idle,
            DialogState::Listening,
            DialogState::Listening,
            DialogState::Idle,
        ] {
            emitter.on_dialog_state(state);
        }

        assert_eq!(
            handle.emitted_members(),
            vec!["on_idle", "on_listen", "on_idle"]
        );
    }

    #[test]
    fn test_connectivity_mapping() {
        let (mut emitter, handle) = create_emitter();

        emitter.on_connectivity(ConnectivityState::Disconnected);
        emitter.on_connectivity(ConnectivityState::Pending);
        emitter.on_connectivity(ConnectivityState::Connected);

        // Disconnected and Pending both read as "connecting", but they
        // are distinct states, so both emit.
        assert_eq!(
            handle.emitted_members(),
            vec!["connecting", "connecting", "ready"]
        );
    }

    #[test]
    fn test_duplicate_connectivity_suppressed() {
        let (mut emitter, handle) = create_emitter();

        emitter.on_connectivity(ConnectivityState::Connected);
        emitter.on_connectivity(ConnectivityState::Connected);

        assert_eq!(handle.emitted_members(), vec!["ready"]);
    }

    #[test]
    fn test_dialog_and_connectivity_dedup_independently() {
        let (mut emitter, handle) = create_emitter();

        emitter.on_dialog_state(DialogState::Idle);
        emitter.on_connectivity(ConnectivityState::Connected);
        emitter.on_dialog_state(DialogState::Idle);
        emitter.on_connectivity(ConnectivityState::Connected);

        assert_eq!(handle.emitted_members(), vec!["on_idle", "ready"]);
    }

    #[test]
    fn test_send_failure_is_swallowed() {
        let (mut emitter, handle) = create_emitter();
        handle.refuse_send(true);

        emitter.on_dialog_state(DialogState::Listening);
        assert!(handle.emitted().is_empty());

        // The state was still recorded: recovery does not re-emit the
        // same state.
        handle.refuse_send(false);
        emitter.on_dialog_state(DialogState::Listening);
        assert!(handle.emitted().is_empty());

        emitter.on_dialog_state(DialogState::Idle);
        assert_eq!(handle.emitted_members(), vec!["on_idle"]);
    }

    #[test]
    fn test_new_fails_when_connect_fails() {
        let (bus, handle) = LoopbackBus::new();
        handle.refuse_connect(true);

        let result = StateSignalEmitter::new(Box::new(bus));
        assert!(matches!(result, Err(BusLinkError::Connect(_))));
    }

    #[test]
    fn test_signals_use_detector_path_and_interface() {
        let (mut emitter, handle) = create_emitter();

        emitter.on_dialog_state(DialogState::Speaking);

        let emitted = handle.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].path, names::DETECTOR_PATH);
        assert_eq!(emitted[0].interface, names::DETECTOR_INTERFACE);
    }

    #[test]
    fn test_states_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&DialogState::Listening).unwrap(),
            "\"listening\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectivityState::Pending).unwrap(),
            "\"pending\""
        );
    }
}
