//! Cancellation and deadlines.

use crate::error::{ReplicationError, ReplicationResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A shared flag that stops in-flight replication runs.
///
/// Clones observe the same flag. Cancellation is sticky: every run started
/// while the flag is set fails with [`ReplicationError::Cancelled`] until
/// [`CancelHandle::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates an unset handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Checkpoint state for one run.
#[derive(Debug)]
pub(crate) struct RunGuard {
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl RunGuard {
    pub(crate) fn new(cancel: CancelHandle, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Fails if the run was cancelled or ran past its deadline.
    pub(crate) fn checkpoint(&self, stage: &'static str) -> ReplicationResult<()> {
        if self.cancel.is_cancelled() {
            tracing::debug!(stage, "cancellation observed");
            return Err(ReplicationError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::debug!(stage, "deadline passed");
            return Err(ReplicationError::Timeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        assert!(!other.is_cancelled());

        handle.cancel();
        assert!(other.is_cancelled());

        other.reset();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn guard_reports_cancel() {
        let handle = CancelHandle::new();
        let guard = RunGuard::new(handle.clone(), None);
        assert!(guard.checkpoint("start").is_ok());

        handle.cancel();
        assert!(matches!(
            guard.checkpoint("start"),
            Err(ReplicationError::Cancelled)
        ));
    }

    #[test]
    fn guard_reports_timeout() {
        let guard = RunGuard::new(CancelHandle::new(), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            guard.checkpoint("facts"),
            Err(ReplicationError::Timeout)
        ));
    }

    #[test]
    fn no_deadline_never_times_out() {
        let guard = RunGuard::new(CancelHandle::new(), None);
        assert!(guard.checkpoint("facts").is_ok());
    }
}
