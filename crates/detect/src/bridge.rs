//! The detection loop: one dedicated thread per bridge instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use hark_buslink::{names, BusLink, PollOutcome};
use hark_stream::AudioStream;

use crate::{DetectorState, KeywordObserver, StateObserver, KEYWORD_LABEL, UNSPECIFIED_INDEX};

/// Upper bound on one poll cycle; also bounds shutdown latency.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Errors from bridge construction. Runtime failures after the loop has
/// started are reported through `StateObserver` only.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("audio stream handle is required")]
    MissingStream,
    #[error("failed to spawn detection thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Bus(#[from] hark_buslink::BusLinkError),
}

/// Bridges `trigger` signals on the system bus to keyword observers.
///
/// Owns its bus link and a single background thread for its whole
/// lifetime. `shutdown` (and `Drop`) joins the thread, so no observer
/// callback is in flight once it returns.
pub struct WakeBridge {
    shutting_down: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WakeBridge {
    /// Connect, subscribe to the detector interface, and start the
    /// detection thread. On any failure nothing keeps running and no
    /// partially-constructed bridge is returned.
    pub fn create(
        mut link: Box<dyn BusLink>,
        stream: Option<Arc<AudioStream>>,
        keyword_observers: Vec<Arc<dyn KeywordObserver>>,
        state_observers: Vec<Arc<dyn StateObserver>>,
    ) -> Result<Self, BridgeError> {
        let Some(stream) = stream else {
            tracing::error!(reason = "null_stream", "create_failed");
            return Err(BridgeError::MissingStream);
        };

        link.connect().map_err(|e| {
            tracing::error!(error = %e, "init_failed");
            e
        })?;
        link.subscribe_signal(names::DETECTOR_INTERFACE).map_err(|e| {
            tracing::error!(error = %e, "init_failed");
            e
        })?;

        let shutting_down = Arc::new(AtomicBool::new(false));
        let flag = shutting_down.clone();
        let thread = std::thread::Builder::new()
            .name("hark-detection".into())
            .spawn(move || detection_loop(link, stream, keyword_observers, state_observers, flag))?;

        tracing::info!("detection_bridge_started");
        Ok(Self {
            shutting_down,
            thread: Some(thread),
        })
    }

    /// Request the loop to stop and join the detection thread. Safe when
    /// the loop already exited on a dead bus.
    pub fn shutdown(&mut self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("detection_thread_panicked");
            }
            tracing::info!("detection_bridge_stopped");
        }
    }

    /// Whether the detection thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for WakeBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn detection_loop(
    mut link: Box<dyn BusLink>,
    stream: Arc<AudioStream>,
    keyword_observers: Vec<Arc<dyn KeywordObserver>>,
    state_observers: Vec<Arc<dyn StateObserver>>,
    shutting_down: Arc<AtomicBool>,
) {
    notify_state(&state_observers, DetectorState::Active);

    while !shutting_down.load(Ordering::SeqCst) {
        match link.poll_once(POLL_TIMEOUT) {
            PollOutcome::BusDown => {
                tracing::error!(reason = "bus_down", "detection_loop_exiting");
                notify_state(&state_observers, DetectorState::Error);
                break;
            }
            PollOutcome::Message(msg) => {
                if msg.is_signal(names::DETECTOR_INTERFACE, names::TRIGGER) {
                    tracing::info!(keyword = KEYWORD_LABEL, "wake_word_detected");
                    for observer in &keyword_observers {
                        observer.on_detection(
                            &stream,
                            KEYWORD_LABEL,
                            UNSPECIFIED_INDEX,
                            UNSPECIFIED_INDEX,
                        );
                    }
                }
            }
            PollOutcome::Idle => {}
        }
    }

    link.close();
}

fn notify_state(observers: &[Arc<dyn StateObserver>], state: DetectorState) {
    tracing::debug!(?state, "detector_state_changed");
    for observer in observers {
        observer.on_state_change(state);
    }
}
