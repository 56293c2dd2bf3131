//! Well-known wire names shared by the bridge and the state emitter.

/// Interface the detector engine and the assistant broadcast on.
pub const DETECTOR_INTERFACE: &str = "io.hark.Detector1";

/// Object path both directions broadcast from.
pub const DETECTOR_PATH: &str = "/io/hark/detector";

/// Inbound: wake-word hit reported by the detector engine.
pub const TRIGGER: &str = "trigger";

// Outbound: dialog state mirrored to bus listeners.
pub const ON_IDLE: &str = "on_idle";
pub const ON_LISTEN: &str = "on_listen";
pub const ON_THINK: &str = "on_think";
pub const ON_SPEAK: &str = "on_speak";

// Outbound: connectivity state mirrored to bus listeners.
pub const CONNECTING: &str = "connecting";
pub const READY: &str = "ready";
