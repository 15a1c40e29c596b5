// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const BUSY: u8 = 0;
const READY: u8 = 1;
const CLOSED: u8 = 2;

/// Single-flight guard for capture cycles
///
/// Starts busy; initialization opens it. [`try_acquire`](Self::try_acquire)
/// is an atomic ready-to-busy transition, so two triggers racing from the
/// button thread and the UI can never both win. Once closed the gate never
/// reopens, even if a late cycle finishes after shutdown.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    state: Arc<AtomicU8>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate if it is ready
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(READY, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Reopen the gate for the next cycle (no-op once closed)
    pub fn release(&self) {
        let _ = self
            .state
            .compare_exchange(BUSY, READY, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Close the gate for good (shutdown)
    pub fn close(&self) {
        self.state.store(CLOSED, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }
}
