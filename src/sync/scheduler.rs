//! # Save Scheduler
//!
//! Debounces progress saves: every edit re-arms a single timer and only the
//! last one fires.
//!
//! ## Features
//!
//! - **Coalescing**: rapid edits produce one save after a quiet period
//! - **Safe Cancellation**: a timer is only aborted while it is still
//!   sleeping; a save that has already started always runs to completion

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct PendingSave {
    handle: JoinHandle<()>,
    /// Cleared by the task itself when its timer fires
    armed: Arc<AtomicBool>,
}

/// Debounce timer for progress saves
#[derive(Debug)]
pub struct SaveDebouncer {
    delay: Duration,
    pending: Mutex<Option<PendingSave>>,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` after the quiet period, replacing any timer still waiting
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let armed = Arc::new(AtomicBool::new(true));
        let delay = self.delay;
        let fired = Arc::clone(&armed);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.swap(false, Ordering::AcqRel) {
                task.await;
            }
        });

        let previous = self.lock().replace(PendingSave { handle, armed });
        if let Some(previous) = previous {
            Self::disarm(previous);
        }
    }

    /// Cancel the waiting timer. Returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(pending) => Self::disarm(pending),
            None => false,
        }
    }

    /// Whether a timer is armed and has not fired yet
    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|pending| pending.armed.load(Ordering::Acquire))
    }

    fn disarm(pending: PendingSave) -> bool {
        let was_armed = pending.armed.swap(false, Ordering::AcqRel);
        if was_armed {
            pending.handle.abort();
        }
        was_armed
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingSave>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SaveDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
