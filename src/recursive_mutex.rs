//! Recursive (reentrant) mutex: `spec.md` §4.5.

use crate::mutex::Mutex;
use crate::thread::{assert_can_block, ThreadHandle};
use crate::time::Deadline;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A reentrant mutual-exclusion lock: the owning uthread may lock it
/// multiple times and must unlock it the same number of times.
///
/// `owner`/`count` are only ever *mutated* by whichever thread currently
/// holds the lock, matching `spec.md`'s invariant and the C source's
/// reasoning for why no extra lock is needed around them ("this check will
/// only be true for the initial lockholder, which cannot concurrently call
/// this function twice — a thread is single-threaded"). Unlike the C
/// source, the fields here are atomics rather than plain reads/writes:
/// Rust's memory model treats an unsynchronized concurrent read racing a
/// write as undefined behavior even when the *logical* race is benign, so
/// the single-writer invariant is preserved with `Acquire`/`Release`
/// instead of with nothing.
pub struct RecursiveMutex {
    mtx: Mutex,
    owner: AtomicU64,
    count: AtomicU32,
}

const NO_OWNER: u64 = 0;

impl RecursiveMutex {
    /// Constructs an unlocked recursive mutex. `const fn`, usable in a
    /// `static`.
    pub const fn new() -> Self {
        Self {
            mtx: Mutex::new(),
            owner: AtomicU64::new(NO_OWNER),
            count: AtomicU32::new(0),
        }
    }

    /// Locks the mutex. If the calling uthread already holds it, increments
    /// the recursion count instead of blocking.
    pub fn lock(&self) {
        assert_can_block();
        let id = ThreadHandle::current().id();
        if self.owner.load(Ordering::Acquire) == id {
            self.count.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.mtx.lock();
        self.claim(id);
    }

    /// Locks the mutex, giving up at `deadline`. On timeout, leaves owner
    /// and recursion count unchanged.
    pub fn timed_lock(&self, deadline: Deadline) -> bool {
        assert_can_block();
        let id = ThreadHandle::current().id();
        if self.owner.load(Ordering::Acquire) == id {
            self.count.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        if !self.mtx.timed_lock(deadline) {
            return false;
        }
        self.claim(id);
        true
    }

    /// Locks the mutex only if it's immediately available (or already held
    /// by the caller).
    pub fn trylock(&self) -> bool {
        assert_can_block();
        let id = ThreadHandle::current().id();
        if self.owner.load(Ordering::Acquire) == id {
            self.count.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        if self.mtx.trylock() {
            self.claim(id);
            true
        } else {
            false
        }
    }

    /// Decrements the recursion count; once it reaches zero, clears the
    /// owner and releases the embedded mutex.
    pub fn unlock(&self) {
        let remaining = self.count.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            self.owner.store(NO_OWNER, Ordering::Release);
            self.mtx.unlock();
        }
    }

    fn claim(&self, id: u64) {
        self.owner.store(id, Ordering::Release);
        self.count.store(1, Ordering::Relaxed);
    }

    pub(crate) fn mutex(&self) -> &Mutex {
        &self.mtx
    }

    /// Used by `CondVar::[timed_]wait_recurse`: surrenders the full
    /// recursion depth before the embedded mutex is released for the wait,
    /// returning the depth to restore on reacquire.
    pub(crate) fn release_for_wait(&self) -> u32 {
        let saved = self.count.swap(0, Ordering::Relaxed);
        self.owner.store(NO_OWNER, Ordering::Release);
        saved
    }

    /// Restores ownership and recursion depth after reacquiring the
    /// embedded mutex at the end of a `wait_recurse`.
    pub(crate) fn restore_after_wait(&self, saved: u32) {
        self.owner.store(ThreadHandle::current().id(), Ordering::Release);
        self.count.store(saved, Ordering::Relaxed);
    }
}

impl Default for RecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecursiveMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveMutex")
            .field("owner", &self.owner.load(Ordering::Relaxed))
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}
