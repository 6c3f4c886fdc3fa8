//! Cooperative cancellation.
//!
//! The serve loop never blocks indefinitely; instead it asks a `QuitSignal`
//! at every poll point whether the operator wants it to stop. Sources:
//! - `QuitFlag`: a shared flag, set from a Ctrl-C handler or another thread
//! - `keyboard::Keyboard`: Escape or `q` typed on the controlling terminal
//! - any `FnMut() -> bool`, mostly for tests

#[cfg(unix)]
pub mod keyboard;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-blocking check for a pending quit request.
///
/// Called from hot polling loops, so implementations must return
/// immediately and do no more than consume a pending input event.
pub trait QuitSignal {
    fn poll_quit(&mut self) -> bool;
}

impl<F: FnMut() -> bool> QuitSignal for F {
    fn poll_quit(&mut self) -> bool {
        self()
    }
}

/// Shared quit flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct QuitFlag {
    requested: Arc<AtomicBool>,
}

impl QuitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl QuitSignal for QuitFlag {
    fn poll_quit(&mut self) -> bool {
        self.is_requested()
    }
}

/// Several quit sources polled in order; the first one to fire wins.
#[derive(Default)]
pub struct QuitSources {
    sources: Vec<Box<dyn QuitSignal + Send>>,
}

impl QuitSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl QuitSignal + Send + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl QuitSignal for QuitSources {
    fn poll_quit(&mut self) -> bool {
        self.sources.iter_mut().any(|source| source.poll_quit())
    }
}
