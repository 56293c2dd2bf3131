//! Wake-word detection bridge.
//!
//! Converts `trigger` signals broadcast by the detector engine on the
//! system bus into keyword-detection callbacks, and mirrors the detector
//! lifecycle to state observers.

mod bridge;

pub use bridge::{BridgeError, WakeBridge, POLL_TIMEOUT};

use std::sync::Arc;

use hark_stream::AudioStream;

/// Marker for a stream offset the detector cannot resolve. The bus
/// protocol carries no sample offsets, so every detection reports this
/// for both begin and end.
pub const UNSPECIFIED_INDEX: u64 = u64::MAX;

/// Keyword label reported for every detection. The engine does not
/// disambiguate between configured wake words.
pub const KEYWORD_LABEL: &str = "anykeyword";

/// Lifecycle state of the detection bridge.
///
/// `Error` is terminal; a new bridge must be created to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Uninitialized,
    Active,
    Error,
}

/// Notified of every recognized wake-word event, in registration order,
/// on the detection thread.
pub trait KeywordObserver: Send + Sync {
    fn on_detection(&self, stream: &Arc<AudioStream>, keyword: &str, begin_index: u64, end_index: u64);
}

/// Notified of detector lifecycle transitions, on the detection thread.
pub trait StateObserver: Send + Sync {
    fn on_state_change(&self, state: DetectorState);
}

struct FnKeywordObserver<F>(F);

impl<F> KeywordObserver for FnKeywordObserver<F>
where
    F: Fn(&Arc<AudioStream>, &str, u64, u64) + Send + Sync,
{
    fn on_detection(&self, stream: &Arc<AudioStream>, keyword: &str, begin_index: u64, end_index: u64) {
        (self.0)(stream, keyword, begin_index, end_index);
    }
}

struct FnStateObserver<F>(F);

impl<F> StateObserver for FnStateObserver<F>
where
    F: Fn(DetectorState) + Send + Sync,
{
    fn on_state_change(&self, state: DetectorState) {
        (self.0)(state);
    }
}

/// Wrap a closure as a keyword observer.
pub fn keyword_observer<F>(f: F) -> Arc<dyn KeywordObserver>
where
    F: Fn(&Arc<AudioStream>, &str, u64, u64) + Send + Sync + 'static,
{
    Arc::new(FnKeywordObserver(f))
}

/// Wrap a closure as a state observer.
pub fn state_observer<F>(f: F) -> Arc<dyn StateObserver>
where
    F: Fn(DetectorState) + Send + Sync + 'static,
{
    Arc::new(FnStateObserver(f))
}
