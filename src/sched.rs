//! The second-level scheduler ("2LS") interface consumed by the sync core.
//!
//! `spec.md` §6 lists the hooks a 2LS may supply; everything else falls
//! back to a default. The C source expresses that fallback as a global
//! `sched_ops` struct of nullable function pointers, checked at every call
//! site (`if (sched_ops->sync_init) ... else uth_default_sync_init(...)`).
//! The Design Notes (§9) ask for this to become "a wait-queue provider
//! capability... resolved once at runtime" — here, a single globally
//! installed `Arc<dyn Scheduler>` with default trait methods standing in for
//! the "hook is unset" branch.

use crate::queue::{DefaultWaitQueue, SyncQueue};
use crate::thread::ThreadHandle;
use std::sync::{Arc, OnceLock};

/// Why a thread blocked, passed to [`Scheduler::thread_has_blocked`].
///
/// `spec.md` only ever uses one kind (`UTH_EXT_BLK_MUTEX`, "mutex-class
/// wait", covering semaphores, mutexes, condition variables, and rwlocks
/// alike), but keeping it as an enum rather than hard-coding that one
/// variant leaves room for a 2LS that wants to account for, say, rwlock
/// waits separately from mutex waits without changing this crate's public
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Blocked on a semaphore, mutex, recursive mutex, condition variable,
    /// or reader-writer lock from this crate.
    MutexClass,
}

/// The interface a second-level scheduler implements to host this crate's
/// sync primitives.
///
/// All methods have defaults that recreate the behavior of the C source's
/// unset hooks, so a 2LS only needs to override what it actually wants to
/// customize.
pub trait Scheduler: Send + Sync + std::fmt::Debug {
    /// Makes `thread` runnable again.
    ///
    /// Always required — there is no meaningful default, since doing
    /// nothing would simply lose the wakeup. Called only after the waker
    /// has released the primitive's spinlock (`spec.md` §5 lock-ordering
    /// rule: primitive-spin before any 2LS-internal lock).
    fn make_runnable(&self, thread: ThreadHandle);

    /// Notifies the scheduler that `thread` has entered this crate's
    /// external blocked state, for whatever bookkeeping the 2LS needs to do
    /// before the thread's vcore (or, here, OS thread) can be reused to run
    /// something else. Called from inside the yield callback, before the
    /// thread is actually enqueued and before the primitive's spinlock is
    /// released.
    fn thread_has_blocked(&self, thread: &ThreadHandle, kind: BlockKind) {
        tracing::trace!(thread = thread.id(), ?kind, "thread blocked on sync primitive");
    }

    /// Suspends the calling thread until some other party calls
    /// `make_runnable(thread)`.
    ///
    /// This is the one hook without a direct analogue in `spec.md`'s 2LS
    /// interface: the C runtime doesn't need it because `uthread_yield`
    /// itself performs the context switch. Without a real vcore dispatcher
    /// to delegate to, this crate needs an explicit "block now" primitive;
    /// the default uses [`std::thread::park`], whose documented contract —
    /// an `unpark` that happens before the matching `park` is never lost —
    /// is exactly the race-freedom `spec.md` §4.3 asks of "atomic
    /// enqueue-and-yield".
    fn suspend_current(&self, thread: &ThreadHandle) {
        let _ = thread;
        std::thread::park();
    }

    /// Wakes every thread in `threads` in one step, for `CondVar::broadcast`
    /// and the `RwLock` unlock restart set.
    ///
    /// The default just calls [`Scheduler::make_runnable`] once per thread.
    /// `spec.md` §6 calls the bulk path optional and notes (§9, Open
    /// Questions) that a 2LS providing it may reorder wakes relative to the
    /// individual path — nothing here relies on any particular order.
    fn thread_bulk_runnable(&self, threads: Vec<ThreadHandle>) {
        for thread in threads {
            self.make_runnable(thread);
        }
    }

    /// Builds a fresh wait queue for a primitive that's initializing.
    ///
    /// The default is the crate's FIFO [`DefaultWaitQueue`]; see `spec.md`
    /// §4.1.
    fn new_sync_queue(&self) -> Box<dyn SyncQueue> {
        Box::new(DefaultWaitQueue::new())
    }
}

/// The default 2LS: one OS thread per uthread, parked/unparked directly.
///
/// Installed automatically the first time any primitive is used without an
/// explicit [`install_scheduler`] call, so the crate works standalone (and
/// in tests) without requiring a real cooperative runtime.
#[derive(Debug, Default)]
pub struct NativeScheduler(());

impl NativeScheduler {
    /// Constructs a new native (OS-thread) scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for NativeScheduler {
    fn make_runnable(&self, thread: ThreadHandle) {
        tracing::trace!(thread = thread.id(), "unparking thread");
        thread.unpark();
    }
}

static SCHEDULER: OnceLock<Arc<dyn Scheduler>> = OnceLock::new();

/// Installs `scheduler` as the global 2LS for this process.
///
/// Must be called, if at all, before any sync primitive in this crate is
/// first used — mirroring the C source's `sched_ops`, which a 2LS sets up
/// during its own initialization, before any uthread can run. Returns
/// `Err(scheduler)` (handing the argument back) if a scheduler — including
/// the automatic [`NativeScheduler`] fallback — has already been installed.
pub fn install_scheduler(scheduler: Arc<dyn Scheduler>) -> Result<(), Arc<dyn Scheduler>> {
    SCHEDULER.set(scheduler)
}

pub(crate) fn current() -> &'static Arc<dyn Scheduler> {
    SCHEDULER.get_or_init(|| Arc::new(NativeScheduler::new()))
}

/// The atomic "check, maybe enqueue, maybe yield" primitive every blocking
/// operation in this crate builds on (`spec.md` §4.3).
///
/// `cb` runs with the calling thread's handle, under one continuous hold of
/// whatever lock guards the primitive's state, and must: check whether the
/// primitive is already available and, if so, take it and return `false`
/// (no blocking needed) — or otherwise notify the scheduler the thread is
/// blocking, enqueue the thread on the relevant wait queue, optionally arm
/// a timeout against that same lock, release the lock, and return `true`.
///
/// Folding the availability check into the *same* critical section as the
/// enqueue (rather than checking, releasing the lock, and enqueueing
/// afterwards) is what `spec.md` §4.3 means by "atomic": a concurrent
/// release can only ever observe this primitive's state either fully
/// before or fully after `cb` runs, never a thread that has decided to
/// block but is not yet reachable through the wait queue. Arming a timeout
/// inside that same section gets the analogous guarantee for free — the
/// alarm thread's handler takes the same lock before its first removal
/// attempt, so it cannot run until `cb`'s critical section (enqueue
/// included) has already completed.
///
/// Only after `cb` returns `true` does this call [`Scheduler::suspend_current`].
/// This is safe against losing the wakeup despite running `cb` *before*
/// suspending (rather than the C source's order, where the scheduler saves
/// the thread's context and only then invokes the callback) because
/// [`Scheduler::suspend_current`]'s contract requires it to be race-free
/// against a [`Scheduler::make_runnable`] call that happens any time after
/// `cb` returns — the same guarantee `std::thread::park` gives via its
/// unpark token, which is what the default scheduler relies on.
pub(crate) fn uthread_yield(cb: impl FnOnce(&ThreadHandle) -> bool) {
    let me = ThreadHandle::current();
    if cb(&me) {
        current().suspend_current(&me);
    }
}
