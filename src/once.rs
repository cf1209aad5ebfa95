//! Lazy, at-most-once primitive initialization.
//!
//! `spec.md` §3 calls this "once-control": a per-primitive flag permitting
//! lazy initialization on first use, so that a primitive can be created with
//! a static, zero-init-compatible initializer (`Mutex::new` as a `const fn`,
//! usable in a `static`) as well as a dynamic one. `std::sync::Once` already
//! has exactly this contract — const-constructible, and
//! [`Once::call_once`](std::sync::Once::call_once) guarantees the closure
//! runs to completion before any caller (including the one that lost the
//! race to run it) observes it as done. We name it [`OnceControl`] rather
//! than using `std::sync::Once` directly at call sites, to keep `spec.md`'s
//! vocabulary (`once_ctl`, `parlib_run_once`) visible in the primitives.

use std::sync::Once;

/// Guarantees `init` runs exactly once across however many racing callers
/// invoke [`OnceControl::run`].
///
/// The reason this exists instead of eagerly building everything in `new`:
/// a primitive's wait queue may need to come from a [`crate::sched::Scheduler`]
/// that is only installed *after* the primitive's `static` was constructed.
/// `OnceControl` defers that decision to first use.
#[derive(Debug)]
pub(crate) struct OnceControl(Once);

impl OnceControl {
    pub(crate) const fn new() -> Self {
        Self(Once::new())
    }

    /// Runs `init` at most once; every caller, racing or not, only returns
    /// after some call to `init` (possibly another thread's) has completed.
    pub(crate) fn run(&self, init: impl FnOnce()) {
        self.0.call_once(init);
    }
}
