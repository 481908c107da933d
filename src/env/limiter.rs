//! Admission Gate
//!
//! Lock-free bound on how many holders of a scarce OS resource (permanent
//! descriptors, mmap regions) may exist at once. Denial never blocks; the
//! caller is expected to fall back to a cheaper strategy.

use std::sync::atomic::{AtomicIsize, Ordering};

/// Non-blocking counting gate
///
/// Every successful `acquire()` must be balanced by exactly one `release()`.
pub struct AdmissionGate {
    /// Budget the gate was built with
    max_acquires: isize,

    /// Remaining slots (may dip below zero for an instant inside `acquire`)
    acquires_allowed: AtomicIsize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `max_acquires` concurrent holders
    pub fn new(max_acquires: usize) -> Self {
        let max_acquires = isize::try_from(max_acquires).unwrap_or(isize::MAX);
        Self {
            max_acquires,
            acquires_allowed: AtomicIsize::new(max_acquires),
        }
    }

    /// Try to take a slot. Returns false when the budget is exhausted.
    pub fn acquire(&self) -> bool {
        let old_acquires_allowed = self.acquires_allowed.fetch_sub(1, Ordering::Relaxed);
        if old_acquires_allowed > 0 {
            return true;
        }

        // Overshot: hand the slot back.
        let pre_increment = self.acquires_allowed.fetch_add(1, Ordering::Relaxed);
        debug_assert!(pre_increment < self.max_acquires);
        false
    }

    /// Return a slot obtained by a successful `acquire()`.
    ///
    /// REQUIRES: the caller holds a slot. Over-release is only caught in
    /// debug builds.
    pub fn release(&self) {
        let old_acquires_allowed = self.acquires_allowed.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            old_acquires_allowed < self.max_acquires,
            "AdmissionGate released more often than acquired"
        );
    }

    /// Budget this gate was created with
    pub fn budget(&self) -> usize {
        self.max_acquires as usize
    }

    /// Slots currently free (a snapshot; racy by nature)
    pub fn available(&self) -> usize {
        self.acquires_allowed.load(Ordering::Relaxed).max(0) as usize
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("budget", &self.budget())
            .field("available", &self.available())
            .finish()
    }
}
