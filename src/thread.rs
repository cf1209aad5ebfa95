//! The uthread handle and the "can this context block" precondition.
//!
//! `spec.md` §3: "An opaque reference identifying a user-level thread. Each
//! thread contains exactly one sync link field usable by a wait queue; a
//! thread may appear in at most one wait queue at a time." The handle here
//! is the non-intrusive flavor from the Design Notes (§9, option (b)): a
//! cheaply cloneable reference rather than an intrusive list link stashed
//! inside an opaque thread struct we don't own. That trades a small
//! allocation per thread for not having to reason about a single shared
//! link field across every primitive a thread could ever block on.
//!
//! Field shape (`id` + an opaque resume capability) mirrors
//! `fimo_tasks_interface`'s `TaskHandle { id: usize, generation: usize }`.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Thread;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct ThreadSlot {
    id: u64,
    native: Thread,
}

/// A handle to a uthread.
///
/// Identifies a thread for wait-queue membership and equality
/// ([`SyncQueue::remove`](crate::queue::SyncQueue::remove)), and carries
/// whatever the active [`crate::sched::Scheduler`] needs to resume it. The
/// default, OS-thread-backed scheduler stores a [`std::thread::Thread`]; a
/// real uthread 2LS would instead carry an index into its own run-queue
/// representation — callers never need to know which.
#[derive(Debug, Clone)]
pub struct ThreadHandle(Arc<ThreadSlot>);

impl ThreadHandle {
    pub(crate) fn for_native_thread() -> Self {
        Self(Arc::new(ThreadSlot {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            native: std::thread::current(),
        }))
    }

    /// The handle of the uthread currently executing.
    ///
    /// # Panics
    ///
    /// Never panics; every OS thread lazily gets its own handle on first
    /// call. A real 2LS that represents uthreads as something other than
    /// one-uthread-per-OS-thread would override this by installing its own
    /// [`crate::sched::Scheduler`] and routing blocking calls through it
    /// instead (this crate has no way to intercept `ThreadHandle::current`
    /// itself, since the OS-thread identity is the only "current uthread"
    /// concept available without a real vcore runtime).
    pub fn current() -> Self {
        CURRENT.with(|cell| {
            let mut slot = cell.take();
            if slot.is_none() {
                slot = Some(Self::for_native_thread());
            }
            let handle = slot.clone().unwrap();
            cell.set(slot);
            handle
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub(crate) fn unpark(&self) {
        self.0.native.unpark();
    }
}

impl PartialEq for ThreadHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ThreadHandle {}

impl std::hash::Hash for ThreadHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

thread_local! {
    static CURRENT: Cell<Option<ThreadHandle>> = const { Cell::new(None) };
    static NON_BLOCKABLE_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Marks the current OS thread as executing in a context that must not
/// block (e.g. a signal handler or other notification context), matching
/// `spec.md` §5: "Every blocking entry asserts that the caller is in a
/// context permitted to block... Violations are treated as programming
/// errors."
///
/// The guard is reentrant: nested scopes compose, and blocking is only
/// allowed again once every guard has been dropped.
#[derive(Debug)]
pub struct NonBlockingScope(());

impl NonBlockingScope {
    /// Enters a non-blocking scope for the current thread.
    pub fn enter() -> Self {
        NON_BLOCKABLE_DEPTH.with(|d| d.set(d.get() + 1));
        Self(())
    }
}

impl Drop for NonBlockingScope {
    fn drop(&mut self) {
        NON_BLOCKABLE_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// Asserts the calling context is permitted to block.
///
/// Every blocking entry point in this crate calls this before touching its
/// primitive's state. A recursive mutex additionally relies on this to
/// justify why `current_thread` is well-defined wherever it matters (§9,
/// Design Notes): by the time this assertion passes, we know we are not
/// inside a signal/notification context, so [`ThreadHandle::current`] names
/// a single, unambiguous uthread.
pub(crate) fn assert_can_block() {
    debug_assert!(
        NON_BLOCKABLE_DEPTH.with(|d| d.get()) == 0,
        "blocking uthread sync call made from a non-blockable context"
    );
}
