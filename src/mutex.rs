//! Non-recursive mutex: `spec.md` §4.4, a semaphore initialized to 1.

use crate::sem::Semaphore;
use crate::time::Deadline;

/// A non-recursive mutual-exclusion lock for uthreads.
///
/// Binary-semaphore specialization: `lock`/`unlock`/`trylock`/`timed_lock`
/// delegate straight to [`Semaphore`]'s `down`/`up`/`trydown`/`timed_down`.
/// Unlocking a mutex you don't hold is a programming error `spec.md` §7
/// explicitly leaves undetected ("undefined — not detected by design") —
/// this type does not track an owner at all, so it has no way to check.
#[derive(Debug)]
pub struct Mutex(Semaphore);

impl Mutex {
    /// Constructs an unlocked mutex. `const fn`, usable in a `static`.
    pub const fn new() -> Self {
        Self(Semaphore::new(1))
    }

    /// Locks the mutex, blocking the calling uthread if it's held.
    pub fn lock(&self) {
        self.0.down();
    }

    /// Locks the mutex, giving up at `deadline`. Returns whether it was
    /// acquired.
    pub fn timed_lock(&self, deadline: Deadline) -> bool {
        self.0.timed_down(deadline)
    }

    /// Locks the mutex only if it's immediately available.
    pub fn trylock(&self) -> bool {
        self.0.trydown()
    }

    /// Unlocks the mutex.
    ///
    /// # Panics
    ///
    /// Does not check that the caller actually holds the lock (`spec.md`
    /// §7); calling this without holding the lock is a programming error
    /// with unspecified effects, same as POSIX.
    pub fn unlock(&self) {
        self.0.up();
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
