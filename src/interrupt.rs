use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A thread-safe flag representing a request to stop the probe
///
/// Clones share the same flag. The Ctrl + C listener triggers it, the transport stops issuing
/// echo requests once it is set and the session moves into its stopping state on the next turn of
/// the run loop.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal(Arc<AtomicBool>);

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the probe to stop
    ///
    /// Returns `true` only for the call that actually flipped the flag, any later call is a no-op.
    pub fn trigger(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Return `true` once a stop has been requested
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
