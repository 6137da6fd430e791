//! Fire-and-forget audio cues. The real speaker lives in the on-floor UI;
//! the daemon only announces which cue to play and never waits on it.

pub trait Notifier: Send {
    fn play(&self, name: &str);
}

/// Default notifier: records the cue in the log stream, where the UI layer
/// (or a human reading the log) picks it up.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn play(&self, name: &str) {
        tracing::info!(sound = name, "Audio cue");
    }
}
