//! Interrupt handling.
//!
//! [`CancelFlag`] is shared between the Ctrl-C handler, the runner and every
//! in-flight transform. Once set, running children are killed and no new
//! fixtures are started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a flag that no signal handler is attached to.
    pub fn manual() -> Self {
        Self::default()
    }

    /// Creates a flag and registers a Ctrl-C handler that sets it.
    ///
    /// If a handler is already installed the flag is still returned and can
    /// be triggered manually.
    pub fn with_ctrlc_handler() -> Self {
        let flag = Self::default();
        let handle = flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, stopping run");
            handle.trigger();
        }) {
            tracing::debug!(error = %e, "could not install Ctrl-C handler");
        }
        flag
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
