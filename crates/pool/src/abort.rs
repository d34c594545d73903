use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    record: Mutex<Option<(String, DateTime<Utc>)>>,
    notify: Notify,
}

/// Cooperative cancellation token shared by the orchestrator, the pool and
/// running jobs.
///
/// The first `abort` wins: later calls keep the original reason and timestamp.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger an abort with a reason.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = "abort requested".into();
        }
        let mut record = self
            .state
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.state.aborted.load(Ordering::SeqCst) {
            return;
        }
        *record = Some((reason.clone(), Utc::now()));
        self.state.aborted.store(true, Ordering::SeqCst);
        drop(record);
        tracing::warn!(reason = %reason, "Abort signal raised");
        self.state.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.lock_record().as_ref().map(|(r, _)| r.clone())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.lock_record().as_ref().map(|(_, t)| *t)
    }

    /// Clear the signal so the token can be reused for a new run.
    pub fn reset(&self) {
        let mut record = self.lock_record();
        *record = None;
        self.state.aborted.store(false, Ordering::SeqCst);
    }

    /// Resolves once the signal is raised.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    fn lock_record(&self) -> std::sync::MutexGuard<'_, Option<(String, DateTime<Utc>)>> {
        self.state
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .field("reason", &self.reason())
            .finish()
    }
}
