use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide single-flight gate for scans. Clones share one state cell.
#[derive(Clone, Debug, Default)]
pub struct ScanCoordinator {
    running: Arc<AtomicBool>,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves idle to running. Returns false if a scan already holds the gate.
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Like `try_begin`, but the gate is released when the guard drops.
    pub fn begin(&self) -> Option<ScanGuard> {
        if self.try_begin() {
            Some(ScanGuard {
                coordinator: self.clone(),
            })
        } else {
            None
        }
    }
}

pub struct ScanGuard {
    coordinator: ScanCoordinator,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.coordinator.end();
    }
}
