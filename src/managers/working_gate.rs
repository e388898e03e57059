//! Process-wide single-flight gate for rewrite runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// At most one holder at a time. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct WorkingGate {
    working: Arc<AtomicBool>,
}

impl WorkingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the gate held and returns the guard, or `None` if a run is
    /// already in flight. Callers drop the trigger instead of queueing it.
    pub fn try_enter(&self) -> Option<WorkingGuard> {
        self.working
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WorkingGuard {
                working: self.working.clone(),
            })
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::Acquire)
    }
}

/// Leaves the gate on drop, whatever the outcome of the run.
#[derive(Debug)]
pub struct WorkingGuard {
    working: Arc<AtomicBool>,
}

impl Drop for WorkingGuard {
    fn drop(&mut self) {
        self.working.store(false, Ordering::Release);
    }
}
