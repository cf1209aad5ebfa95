//! Counting semaphore: `spec.md` §4.3.

use crate::once::OnceControl;
use crate::queue::SyncQueue;
use crate::sched::{self, BlockKind};
use crate::spinlock::SpinLock;
use crate::thread::assert_can_block;
use crate::time::Deadline;
use crate::timeout::TimeoutBlob;

struct SemInner {
    count: u32,
    queue: Option<Box<dyn SyncQueue>>,
}

/// A counting semaphore, the foundation [`crate::Mutex`] specializes.
///
/// Supports static zero-init (`const fn new`, usable in a `static`); the
/// wait queue itself is created lazily on first use, since a 2LS may only
/// be installed ([`sched::install_scheduler`]) after a `static` semaphore
/// was constructed.
pub struct Semaphore {
    once: OnceControl,
    inner: SpinLock<SemInner>,
}

impl Semaphore {
    /// Constructs a semaphore with the given initial count.
    ///
    /// `const fn`, so this can initialize a `static`: `count` is set
    /// immediately (mirrors `spec.md`: "If we used a static initializer for
    /// a semaphore, count is already set"), and the wait queue is deferred
    /// to first use.
    pub const fn new(count: u32) -> Self {
        Self {
            once: OnceControl::new(),
            inner: SpinLock::new(SemInner { count, queue: None }),
        }
    }

    fn ensure_init(&self) {
        self.once.run(|| {
            let mut inner = self.inner.lock();
            inner.queue = Some(sched::current().new_sync_queue());
        });
    }

    /// Acquires a unit, blocking the calling uthread if none is available.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if called from a non-blockable context;
    /// see [`crate::thread::assert_can_block`].
    pub fn down(&self) {
        assert_can_block();
        self.ensure_init();
        self.acquire(None);
    }

    /// Like [`Semaphore::down`], but gives up at `deadline`.
    ///
    /// Returns `true` if a unit was acquired, `false` on timeout. On
    /// timeout the semaphore's internal queue no longer references this
    /// thread — `spec.md` §8 property 8.
    pub fn timed_down(&self, deadline: Deadline) -> bool {
        assert_can_block();
        self.ensure_init();
        self.acquire(Some(deadline))
    }

    /// Acquires a unit only if one is immediately available. Never blocks.
    pub fn trydown(&self) -> bool {
        assert_can_block();
        self.ensure_init();
        self.try_take()
    }

    /// Releases a unit.
    ///
    /// If a thread is waiting, the unit is handed directly to it (the
    /// count never transiently rises to be immediately taken back down);
    /// otherwise the count is incremented.
    pub fn up(&self) {
        self.ensure_init();
        let woken = {
            let mut inner = self.inner.lock();
            let next = inner.queue.as_mut().unwrap().pop_next();
            if next.is_none() {
                inner.count += 1;
            }
            next
        };
        if let Some(thread) = woken {
            sched::current().make_runnable(thread);
        }
    }

    fn try_take(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.count > 0 {
            inner.count -= 1;
            true
        } else {
            false
        }
    }

    /// Acquires a unit, blocking if none is immediately available.
    ///
    /// The count check and, if blocking is required, the enqueue (and the
    /// optional timeout arm) all happen inside [`sched::uthread_yield`]'s
    /// single continuous hold of `self.inner`'s lock — never as a separate
    /// check followed by a later enqueue — so a concurrent [`Semaphore::up`]
    /// can never observe "count == 0 and no one queued" while a thread has
    /// already decided to block but hasn't enqueued itself yet.
    fn acquire(&self, deadline: Option<Deadline>) -> bool {
        let self_addr = std::ptr::from_ref(self) as usize;
        let mut blob: Option<TimeoutBlob> = None;

        sched::uthread_yield(|thread| {
            let mut inner = self.inner.lock();
            if inner.count > 0 {
                inner.count -= 1;
                return false;
            }

            sched::current().thread_has_blocked(thread, BlockKind::MutexClass);
            inner.queue.as_mut().unwrap().enqueue(thread.clone());
            if let Some(deadline) = deadline {
                blob = Some(TimeoutBlob::arm(deadline, thread.clone(), move |t| {
                    // SAFETY: `self` outlives this alarm — `timed_down`
                    // does not return until `blob.unset()` has joined the
                    // alarm thread below, which happens before this stack
                    // frame returns. Arming while `inner` is still locked
                    // above also guarantees the handler's own lock
                    // attempt (below) cannot run until this enqueue has
                    // completed.
                    let sem = unsafe { &*(self_addr as *const Semaphore) };
                    sem.inner.lock().queue.as_mut().unwrap().remove(t)
                }));
            }
            true
        });

        match blob {
            Some(blob) => !blob.unset(),
            None => true,
        }
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("count", &self.inner.lock().count)
            .finish()
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        if let Some(queue) = &inner.queue {
            debug_assert!(
                queue.is_empty(),
                "dropped a semaphore while threads were still waiting on it"
            );
        }
    }
}
