//! Per-element read/write latch
//!
//! A latch is a single atomic state word:
//!
//! ```text
//!   0            idle
//!   1..=MAX-1    reading(n)
//!   u32::MAX     writing
//! ```
//!
//! Transitions are compare-and-swap. Acquisition never blocks: it retries a
//! bounded number of times (spinning first, then yielding the thread) and
//! reports `false` when the budget runs out. The caller decides whether to
//! retry or abort; element operations turn the `false` into
//! [`GraphError::Collision`](super::GraphError::Collision).

use crate::config::LatchConfig;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const IDLE: u32 = 0;
const WRITING: u32 = u32::MAX;
const MAX_READERS: u32 = u32::MAX - 1;

/// Observable state of a latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Idle,
    Reading(u32),
    Writing,
}

/// Multiple-reader / single-writer latch with non-blocking acquisition
pub struct ElementLatch {
    state: AtomicU32,
    retry: LatchConfig,
}

impl ElementLatch {
    /// Create an idle latch with the default retry budget
    pub fn new() -> Self {
        Self::with_config(LatchConfig::default())
    }

    /// Create an idle latch with an explicit retry budget
    pub fn with_config(retry: LatchConfig) -> Self {
        Self {
            state: AtomicU32::new(IDLE),
            retry,
        }
    }

    /// Try to enter read mode. Returns `false` if a writer held the latch for
    /// the whole retry budget.
    pub fn acquire_read(&self) -> bool {
        let mut current = self.state.load(Ordering::Relaxed);
        for attempt in 0..self.retry.total_attempts() {
            if current < MAX_READERS {
                match self.state.compare_exchange_weak(
                    current,
                    current + 1,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return true,
                    Err(observed) => current = observed,
                }
            }
            self.backoff(attempt);
            current = self.state.load(Ordering::Relaxed);
        }
        false
    }

    /// Leave read mode. Returns `false`, leaving the state untouched, if the
    /// latch was not held for reading.
    pub fn release_read(&self) -> bool {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            if current == IDLE || current == WRITING {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Try to enter write mode. Returns `false` if readers or another writer
    /// held the latch for the whole retry budget.
    pub fn acquire_write(&self) -> bool {
        for attempt in 0..self.retry.total_attempts() {
            if self
                .state
                .compare_exchange_weak(IDLE, WRITING, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
            self.backoff(attempt);
        }
        false
    }

    /// Leave write mode. Returns `false`, leaving the state untouched, if the
    /// latch was not held for writing.
    pub fn release_write(&self) -> bool {
        self.state
            .compare_exchange(WRITING, IDLE, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Current state, for diagnostics only (it may change immediately)
    pub fn snapshot(&self) -> LatchState {
        match self.state.load(Ordering::Relaxed) {
            IDLE => LatchState::Idle,
            WRITING => LatchState::Writing,
            n => LatchState::Reading(n),
        }
    }

    /// Retry budget this latch was built with
    pub fn config(&self) -> LatchConfig {
        self.retry
    }

    fn backoff(&self, attempt: u32) {
        if attempt < self.retry.spin_attempts {
            // 1, 2, 4 ... 64 pause instructions
            for _ in 0..(1u32 << attempt.min(6)) {
                std::hint::spin_loop();
            }
        } else {
            std::thread::yield_now();
        }
    }
}

impl Default for ElementLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementLatch")
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Element state reachable only through a held latch
///
/// The latch is private: the only way to touch the value is a guard returned
/// by [`try_read`](Self::try_read) or [`try_write`](Self::try_write), and the
/// guard releases the latch when dropped.
pub struct LatchedCell<T> {
    latch: ElementLatch,
    value: UnsafeCell<T>,
}

// SAFETY: every shared access to `value` goes through a guard, and guards only
// exist while the latch is held in the matching mode. Readers share `&T`
// across threads (needs `T: Sync`); a writer may have been created on another
// thread than the one that created the value (needs `T: Send`).
unsafe impl<T: Send> Send for LatchedCell<T> {}
unsafe impl<T: Send + Sync> Sync for LatchedCell<T> {}

impl<T> LatchedCell<T> {
    pub fn new(value: T, retry: LatchConfig) -> Self {
        Self {
            latch: ElementLatch::with_config(retry),
            value: UnsafeCell::new(value),
        }
    }

    /// Shared access, or `None` on collision
    pub fn try_read(&self) -> Option<LatchReadGuard<'_, T>> {
        if self.latch.acquire_read() {
            Some(LatchReadGuard { cell: self })
        } else {
            None
        }
    }

    /// Exclusive access, or `None` on collision
    pub fn try_write(&self) -> Option<LatchWriteGuard<'_, T>> {
        if self.latch.acquire_write() {
            Some(LatchWriteGuard { cell: self })
        } else {
            None
        }
    }

    /// Direct access through a unique borrow; no latching needed
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    pub fn latch_state(&self) -> LatchState {
        self.latch.snapshot()
    }
}

impl<T> fmt::Debug for LatchedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatchedCell")
            .field("latch", &self.latch)
            .finish_non_exhaustive()
    }
}

/// Read-mode guard; releases the latch on drop
pub struct LatchReadGuard<'a, T> {
    cell: &'a LatchedCell<T>,
}

impl<T> Deref for LatchReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: read mode is held, so no writer can hold `&mut T`.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> Drop for LatchReadGuard<'_, T> {
    fn drop(&mut self) {
        let released = self.cell.latch.release_read();
        debug_assert!(released, "read guard dropped without read mode held");
    }
}

/// Write-mode guard; releases the latch on drop
pub struct LatchWriteGuard<'a, T> {
    cell: &'a LatchedCell<T>,
}

impl<T> Deref for LatchWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: write mode is held exclusively.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for LatchWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: write mode is held exclusively.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for LatchWriteGuard<'_, T> {
    fn drop(&mut self) {
        let released = self.cell.latch.release_write();
        debug_assert!(released, "write guard dropped without write mode held");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    fn tight() -> LatchConfig {
        LatchConfig {
            spin_attempts: 2,
            yield_attempts: 0,
        }
    }

    #[test]
    fn test_many_readers() {
        let latch = ElementLatch::new();
        assert!(latch.acquire_read());
        assert!(latch.acquire_read());
        assert!(latch.acquire_read());
        assert_eq!(latch.snapshot(), LatchState::Reading(3));

        latch.release_read();
        latch.release_read();
        latch.release_read();
        assert_eq!(latch.snapshot(), LatchState::Idle);
    }

    #[test]
    fn test_writer_excludes_everyone() {
        let latch = ElementLatch::with_config(tight());
        assert!(latch.acquire_write());
        assert_eq!(latch.snapshot(), LatchState::Writing);

        assert!(!latch.acquire_write());
        assert!(!latch.acquire_read());

        latch.release_write();
        assert!(latch.acquire_read());
        latch.release_read();
    }

    #[test]
    fn test_reader_excludes_writer() {
        let latch = ElementLatch::with_config(tight());
        assert!(latch.acquire_read());
        assert!(!latch.acquire_write());
        latch.release_read();
        assert!(latch.acquire_write());
        latch.release_write();
    }

    #[test]
    fn test_stray_release_leaves_state_alone() {
        let latch = ElementLatch::with_config(tight());
        assert!(!latch.release_read());
        assert!(!latch.release_write());
        assert_eq!(latch.snapshot(), LatchState::Idle);

        assert!(latch.acquire_write());
        assert!(!latch.release_read());
        assert_eq!(latch.snapshot(), LatchState::Writing);
        assert!(latch.release_write());

        assert!(latch.acquire_read());
        assert!(!latch.release_write());
        assert_eq!(latch.snapshot(), LatchState::Reading(1));
        assert!(latch.release_read());
        assert!(!latch.release_read());
        assert_eq!(latch.snapshot(), LatchState::Idle);
    }

    #[test]
    fn test_guards_release_on_drop() {
        let cell = LatchedCell::new(5u32, tight());
        {
            let mut guard = cell.try_write().unwrap();
            *guard += 1;
            assert!(cell.try_read().is_none());
        }
        assert_eq!(cell.latch_state(), LatchState::Idle);

        let r1 = cell.try_read().unwrap();
        let r2 = cell.try_read().unwrap();
        assert_eq!(*r1 + *r2, 12);
        assert!(cell.try_write().is_none());
        drop(r1);
        drop(r2);
        assert_eq!(cell.into_inner(), 6);
    }

    #[test]
    fn test_write_critical_sections_never_overlap() {
        let latch = Arc::new(ElementLatch::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let successes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                let successes = Arc::clone(&successes);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        if latch.acquire_write() {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::hint::spin_loop();
                            inside.fetch_sub(1, Ordering::SeqCst);
                            successes.fetch_add(1, Ordering::SeqCst);
                            latch.release_write();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(successes.load(Ordering::SeqCst) > 0);
        assert_eq!(latch.snapshot(), LatchState::Idle);
    }
}
