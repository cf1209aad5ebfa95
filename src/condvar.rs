//! Condition variable: `spec.md` §4.6.

use crate::mutex::Mutex;
use crate::once::OnceControl;
use crate::queue::SyncQueue;
use crate::recursive_mutex::RecursiveMutex;
use crate::sched::{self, BlockKind};
use crate::spinlock::SpinLock;
use crate::thread::assert_can_block;
use crate::time::Deadline;
use crate::timeout::TimeoutBlob;

struct CvInner {
    queue: Option<Box<dyn SyncQueue>>,
}

/// A condition variable coupled to an external mutex at each wait call,
/// same as POSIX and `spec.md` §4.6.
///
/// Waiting atomically releases the associated mutex and blocks; waking
/// reacquires it before returning. The coupling is per-call rather than
/// fixed at construction, so one condition variable may be used with
/// different mutexes across its lifetime (`spec.md` leaves this
/// unconstrained).
pub struct CondVar {
    once: OnceControl,
    inner: SpinLock<CvInner>,
}

impl CondVar {
    /// Constructs a condition variable with no waiters. `const fn`, usable
    /// in a `static`.
    pub const fn new() -> Self {
        Self {
            once: OnceControl::new(),
            inner: SpinLock::new(CvInner { queue: None }),
        }
    }

    fn ensure_init(&self) {
        self.once.run(|| {
            let mut inner = self.inner.lock();
            inner.queue = Some(sched::current().new_sync_queue());
        });
    }

    /// Atomically unlocks `mtx` and blocks until signalled or broadcast to,
    /// then reacquires `mtx` before returning.
    ///
    /// Like POSIX condition variables, may wake spuriously — nothing here
    /// promises the awaited condition actually holds on return, only that
    /// `mtx` is held again. Callers must re-check their predicate in a loop.
    pub fn wait(&self, mtx: &Mutex) {
        self.wait_impl(mtx, None);
    }

    /// Like [`CondVar::wait`], but gives up at `deadline`. Returns `false`
    /// on timeout; either way `mtx` is held again on return.
    pub fn timed_wait(&self, mtx: &Mutex, deadline: Deadline) -> bool {
        self.wait_impl(mtx, Some(deadline))
    }

    /// The recursive-mutex counterpart of [`CondVar::wait`].
    ///
    /// A recursive mutex's full recursion depth is surrendered for the
    /// duration of the wait (mirroring the C source's `_wait_recurse`,
    /// which stashes `r_mtx->lockholder`/`count` and zeroes them before
    /// unlocking down to the embedded mutex) and restored once it's
    /// reacquired, so a condition variable paired with a recursive mutex
    /// behaves as if the calling thread had unlocked it all the way.
    pub fn wait_recurse(&self, r_mtx: &RecursiveMutex) {
        self.wait_recurse_impl(r_mtx, None);
    }

    /// Like [`CondVar::wait_recurse`], but gives up at `deadline`.
    pub fn timed_wait_recurse(&self, r_mtx: &RecursiveMutex, deadline: Deadline) -> bool {
        self.wait_recurse_impl(r_mtx, Some(deadline))
    }

    /// Wakes one waiting thread, if any.
    pub fn signal(&self) {
        self.ensure_init();
        let woken = {
            let mut inner = self.inner.lock();
            inner.queue.as_mut().unwrap().pop_next()
        };
        if let Some(thread) = woken {
            sched::current().make_runnable(thread);
        }
    }

    /// Wakes every currently waiting thread.
    ///
    /// Matches the C source's `_broadcast`: the whole queue is swapped out
    /// under the condition variable's spinlock into a fresh, empty one, and
    /// the swapped-out threads are only woken after that lock is released —
    /// so none of the woken threads can re-enqueue themselves on this
    /// broadcast's queue before it's drained, and a thread arriving after
    /// the swap waits for the *next* signal/broadcast instead of being
    /// incorrectly caught up in this one.
    pub fn broadcast(&self) {
        self.ensure_init();
        let mut drained = sched::current().new_sync_queue();
        {
            let mut inner = self.inner.lock();
            inner.queue.as_mut().unwrap().swap(&mut *drained);
        }
        let mut woken = Vec::new();
        while let Some(thread) = drained.pop_next() {
            woken.push(thread);
        }
        sched::current().thread_bulk_runnable(woken);
    }

    fn wait_impl(&self, mtx: &Mutex, deadline: Option<Deadline>) -> bool {
        assert_can_block();
        self.ensure_init();
        let result = self.enqueue_and_release(mtx, deadline);
        mtx.lock();
        result
    }

    fn wait_recurse_impl(&self, r_mtx: &RecursiveMutex, deadline: Option<Deadline>) -> bool {
        assert_can_block();
        self.ensure_init();
        let saved_count = r_mtx.release_for_wait();
        let result = self.enqueue_and_release(r_mtx.mutex(), deadline);
        r_mtx.mutex().lock();
        r_mtx.restore_after_wait(saved_count);
        result
    }

    /// Enqueues the calling thread on this condition variable's wait queue
    /// and unlocks `mtx`, as one atomic step from the perspective of a
    /// concurrent `signal`/`broadcast`, then blocks.
    ///
    /// Lock ordering matches the C source's comment in `__cv_wait_cb`: the
    /// condition variable's spinlock is acquired (and dropped) strictly
    /// before `mtx` is unlocked, never the reverse, so a signaller taking
    /// the condition variable's spinlock can never be stalled behind
    /// whatever `mtx`'s own internal lock is doing.
    ///
    /// The optional timeout is armed *inside* the same hold of the
    /// condition variable's spinlock that performs the enqueue, not before
    /// it: arming earlier would let a near-immediate (or simply
    /// unluckily-scheduled) alarm fire and attempt its removal before the
    /// thread is actually on the queue anywhere, finding nothing to remove
    /// and leaving the wait with no alarm left to ever time it out. Since
    /// the handler's removal attempt takes this same spinlock, arming while
    /// it's still held guarantees the handler cannot run until the enqueue
    /// below has completed.
    fn enqueue_and_release(&self, mtx: &Mutex, deadline: Option<Deadline>) -> bool {
        let self_addr = std::ptr::from_ref(self) as usize;
        let mut blob: Option<TimeoutBlob> = None;

        sched::uthread_yield(|thread| {
            sched::current().thread_has_blocked(thread, BlockKind::MutexClass);
            {
                let mut inner = self.inner.lock();
                inner.queue.as_mut().unwrap().enqueue(thread.clone());
                if let Some(deadline) = deadline {
                    blob = Some(TimeoutBlob::arm(deadline, thread.clone(), move |t| {
                        // SAFETY: see `Semaphore::acquire` — `self` outlives
                        // this alarm for the same reason.
                        let cv = unsafe { &*(self_addr as *const CondVar) };
                        cv.inner.lock().queue.as_mut().unwrap().remove(t)
                    }));
                }
            }
            mtx.unlock();
            true
        });

        match blob {
            Some(blob) => !blob.unset(),
            None => true,
        }
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CondVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CondVar").finish_non_exhaustive()
    }
}

impl Drop for CondVar {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        if let Some(queue) = &inner.queue {
            debug_assert!(
                queue.is_empty(),
                "dropped a condition variable while threads were still waiting on it"
            );
        }
    }
}
