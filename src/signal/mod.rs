//! Interrupt handling (SIGINT/SIGTERM)
//!
//! On the first signal the pending scheme snapshot is written back, the
//! run's transient files are removed, and the process exits with
//! `EXIT_CODE_INTERRUPTED`. Signals arriving while that
//! restoration is in flight are ignored.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::progress::Progress;
use crate::scheme::RestoreRegistry;

/// Exit code for interrupted runs
pub const EXIT_CODE_INTERRUPTED: i32 = 80;

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: restore and exit
    RestoreAndExit,
    /// Restoration already under way
    Ignore,
}

/// Signal counter shared with the handler thread
#[derive(Debug, Default)]
pub struct SignalState {
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of signals received so far
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Whether an interrupt has been received
    pub fn is_interrupted(&self) -> bool {
        self.signal_count() > 0
    }

    /// Record a signal and decide what to do with it
    pub fn handle_signal(&self) -> SignalAction {
        let previous = self
            .signal_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
            .unwrap_or(u8::MAX);

        if previous == 0 {
            SignalAction::RestoreAndExit
        } else {
            SignalAction::Ignore
        }
    }
}

/// Installs the process-wide interrupt handler
pub struct SignalHandler {
    state: Arc<SignalState>,
    registry: RestoreRegistry,
    progress: Progress,
}

impl SignalHandler {
    pub fn new(registry: RestoreRegistry, progress: Progress) -> Self {
        Self {
            state: Arc::new(SignalState::new()),
            registry,
            progress,
        }
    }

    /// Shared signal state
    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler. May only be called once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        let registry = self.registry.clone();
        let progress = self.progress;

        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::RestoreAndExit => {
                eprintln!("\nReceived interrupt signal, restoring scheme...");
                let code = on_interrupt(&registry, progress);
                std::process::exit(code);
            }
            SignalAction::Ignore => {}
        })
    }
}

/// Restore the pending scheme (if any), remove tracked transient files and
/// return the exit code to use.
pub fn on_interrupt(registry: &RestoreRegistry, progress: Progress) -> i32 {
    match registry.restore_now() {
        Ok(Some(_)) => progress.step("Restored scheme"),
        Ok(None) => {}
        Err(e) => progress.failure(format!("Failed to restore scheme: {}", e)),
    }
    match registry.remove_tracked() {
        Ok(0) => {}
        Ok(_) => progress.step("Cleaned up temporary files"),
        Err(e) => progress.failure(format!("Failed to remove temporary files: {}", e)),
    }
    progress.failure("Interrupted");
    EXIT_CODE_INTERRUPTED
}
