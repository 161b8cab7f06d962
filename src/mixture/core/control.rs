//! Cancellation, deadlines and worker pools for long-running fits.
//!
//! [`RunControl`] is a cheap, cloneable handle shared by every worker of a
//! fit, sweep or bootstrap. EM checks it once per iteration and the
//! bootstrap once per draw, so cancellation and timeouts become reported
//! statuses instead of hangs. [`run_in_pool`] scopes parallel work to a
//! dedicated rayon pool when an explicit worker count is requested.
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::mixture::errors::{MixtureError, MixtureResult};

/// Why a run stopped before finishing its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

/// Shared cancel flag plus an optional wall-clock deadline.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    /// No deadline, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        RunControl { cancelled: Arc::new(AtomicBool::new(false)), deadline: Some(deadline) }
    }

    /// Request cancellation; visible to every clone of this handle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some(reason)` once the run should stop. Cancellation wins over the
    /// deadline when both apply.
    pub fn check(&self) -> Option<StopReason> {
        if self.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }
}

/// Run `f` inside a dedicated pool of `workers` threads, or on the current
/// (global) pool when `workers` is `None`.
pub fn run_in_pool<R, F>(workers: Option<usize>, f: F) -> MixtureResult<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match workers {
        None => Ok(f()),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| MixtureError::ThreadPool { text: e.to_string() })?;
            Ok(pool.install(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Verify that cancellation is shared across clones and outranks the
    // deadline.
    //
    // Given
    // -----
    // - A control with an already-expired deadline, cloned and then cancelled.
    //
    // Expect
    // ------
    // - Before cancelling: `DeadlineExceeded`; after: `Cancelled` on both
    //   handles.
    fn check_reports_deadline_then_cancellation() {
        // Arrange
        let ctrl = RunControl::with_deadline(Instant::now());
        let clone = ctrl.clone();

        // Act / Assert
        assert_eq!(clone.check(), Some(StopReason::DeadlineExceeded));
        ctrl.cancel();
        assert_eq!(clone.check(), Some(StopReason::Cancelled));
        assert!(ctrl.is_cancelled());
        assert_eq!(RunControl::new().check(), None);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `run_in_pool` runs work on a dedicated pool of the requested size.
    //
    // Given
    // -----
    // - `workers = Some(2)`.
    //
    // Expect
    // ------
    // - The closure observes two threads in its pool.
    fn run_in_pool_uses_requested_thread_count() {
        let threads = run_in_pool(Some(2), rayon::current_num_threads).unwrap();
        assert_eq!(threads, 2);
        assert_eq!(run_in_pool(None, || 7).unwrap(), 7);
    }
}
