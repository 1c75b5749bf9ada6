//! Non-queueing mutual exclusion.
//!
//! A `BusyLock` either admits a caller or tells it to go away; nobody waits.
//! The engine uses one as the step transition lock and one as the
//! `save_in_progress` flag for draft saves.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct BusyLock {
    held: AtomicBool,
}

impl BusyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if it is free. The lock is released when the guard
    /// drops, including when the owning future is dropped mid-await.
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding a `BusyLock`.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    lock: &'a BusyLock,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}
