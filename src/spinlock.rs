//! The per-primitive spinlock.
//!
//! `spec.md` treats the spinlock as an external collaborator ("assumed given
//! as a fair or pdr-style spinlock usable from cooperative context"): a real
//! uthread runtime ships its own. This crate still needs a working one to be
//! usable standalone, so it wraps `parking_lot::Mutex`, which is already the
//! spin-then-park primitive the teacher workspace depends on throughout
//! (`fimo_tasks_interface`, `fimo_tasks`, `fimo_logging` all pull in
//! `parking_lot`). Critical sections guarded by [`SpinLock`] are always short
//! — a handful of field reads/writes and a queue push/pop — and are never
//! held across a call into another primitive, so the spin-then-park
//! trade-off parking_lot makes is exactly right here.

use parking_lot::{Mutex, MutexGuard};

/// A short-held lock guarding a primitive's internal state.
///
/// Named distinctly from `std::sync::Mutex`/`parking_lot::Mutex` to keep the
/// vocabulary of `spec.md` (`spin_pdr_lock`/`spin_pdr_unlock`) visible at the
/// call sites that matter for the lock-ordering argument: the spinlock is
/// always acquired before any lock the scheduler might take internally.
pub(crate) struct SpinLock<T>(Mutex<T>);

impl<T> SpinLock<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_lock() {
            Some(guard) => f.debug_tuple("SpinLock").field(&*guard).finish(),
            None => f.write_str("SpinLock(<locked>)"),
        }
    }
}
