use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shutdown request shared between the signal handler and the run loop.
///
/// The loop only looks at it between steps, never while blocked in a
/// network call or a sleep.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
