//! Reader-writer lock: `spec.md` §4.7.

use crate::once::OnceControl;
use crate::queue::SyncQueue;
use crate::sched::{self, BlockKind};
use crate::spinlock::SpinLock;
use crate::thread::{assert_can_block, ThreadHandle};
use crate::time::Deadline;
use crate::timeout::TimeoutBlob;

struct RwInner {
    nr_readers: u32,
    has_writer: bool,
    readers: Option<Box<dyn SyncQueue>>,
    writers: Option<Box<dyn SyncQueue>>,
}

/// A reader-writer lock, writer-preferring on contention.
///
/// Grounded directly on the C source's `uth_rwlock_*` family: readers may
/// run concurrently, a writer excludes everyone, and whenever both a reader
/// and a writer are waiting a writer is woken first (`__rw_unlock_writer`
/// checks its own writer queue before touching the reader queue at all).
/// This avoids writer starvation under steady reader pressure at the cost
/// of readers occasionally waiting behind a writer that itself arrived
/// after them.
pub struct RwLock {
    once: OnceControl,
    inner: SpinLock<RwInner>,
}

impl RwLock {
    /// Constructs an unlocked rwlock. `const fn`, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            once: OnceControl::new(),
            inner: SpinLock::new(RwInner {
                nr_readers: 0,
                has_writer: false,
                readers: None,
                writers: None,
            }),
        }
    }

    fn ensure_init(&self) {
        self.once.run(|| {
            let mut inner = self.inner.lock();
            inner.readers = Some(sched::current().new_sync_queue());
            inner.writers = Some(sched::current().new_sync_queue());
        });
    }

    /// Acquires the lock for reading, blocking if a writer holds it or is
    /// waiting.
    pub fn rdlock(&self) {
        assert_can_block();
        self.ensure_init();
        self.acquire_read(None);
    }

    /// Like [`RwLock::rdlock`], but gives up at `deadline`.
    pub fn timed_rdlock(&self, deadline: Deadline) -> bool {
        assert_can_block();
        self.ensure_init();
        self.acquire_read(Some(deadline))
    }

    /// Acquires the lock for reading only if immediately available.
    pub fn try_rdlock(&self) -> bool {
        assert_can_block();
        self.ensure_init();
        self.try_rdlock_inner()
    }

    /// Acquires the lock for writing, blocking if any reader or writer
    /// holds it.
    pub fn wrlock(&self) {
        assert_can_block();
        self.ensure_init();
        self.acquire_write(None);
    }

    /// Like [`RwLock::wrlock`], but gives up at `deadline`.
    pub fn timed_wrlock(&self, deadline: Deadline) -> bool {
        assert_can_block();
        self.ensure_init();
        self.acquire_write(Some(deadline))
    }

    /// Acquires the lock for writing only if immediately available.
    pub fn try_wrlock(&self) -> bool {
        assert_can_block();
        self.ensure_init();
        self.try_wrlock_inner()
    }

    /// Releases the lock, however the caller holds it.
    ///
    /// A write hold is always exclusive, so `has_writer` alone tells this
    /// which release path applies — there is no need for the caller to say
    /// which kind of hold it's releasing, matching `spec.md`'s single
    /// `unlock` operation.
    pub fn unlock(&self) {
        if self.inner.lock().has_writer {
            self.unlock_writer();
        } else {
            self.unlock_reader();
        }
    }

    /// Releases a read hold.
    ///
    /// If this was the last active reader and a writer is waiting, wakes
    /// exactly one writer (mirrors `__rw_unlock_reader`).
    fn unlock_reader(&self) {
        let woken = {
            let mut inner = self.inner.lock();
            debug_assert!(inner.nr_readers > 0, "unlock_reader with no active reader");
            inner.nr_readers -= 1;
            if inner.nr_readers == 0 {
                let next = inner.writers.as_mut().unwrap().pop_next();
                if next.is_some() {
                    inner.has_writer = true;
                }
                next
            } else {
                None
            }
        };
        if let Some(thread) = woken {
            sched::current().make_runnable(thread);
        }
    }

    /// Releases a write hold.
    ///
    /// Writer-preferring: if any writer is waiting, wakes exactly one of
    /// them and hands it the lock directly, without ever granting readers
    /// in between. Otherwise, wakes every waiting reader at once and hands
    /// all of them the lock together (mirrors `__rw_unlock_writer`'s
    /// restartee set, built under the spinlock and only woken after it's
    /// released).
    fn unlock_writer(&self) {
        enum Woken {
            Writer(ThreadHandle),
            Readers(Vec<ThreadHandle>),
            None,
        }

        let woken = {
            let mut inner = self.inner.lock();
            debug_assert!(inner.has_writer, "unlock_writer with no active writer");
            if let Some(writer) = inner.writers.as_mut().unwrap().pop_next() {
                Woken::Writer(writer)
            } else {
                inner.has_writer = false;
                let readers = inner.readers.as_mut().unwrap();
                let mut drained = Vec::new();
                while let Some(reader) = readers.pop_next() {
                    drained.push(reader);
                }
                inner.nr_readers = drained.len() as u32;
                if drained.is_empty() {
                    Woken::None
                } else {
                    Woken::Readers(drained)
                }
            }
        };

        match woken {
            Woken::Writer(thread) => sched::current().make_runnable(thread),
            Woken::Readers(threads) => sched::current().thread_bulk_runnable(threads),
            Woken::None => {}
        }
    }

    fn try_rdlock_inner(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.has_writer && inner.writers.as_ref().unwrap().is_empty() {
            inner.nr_readers += 1;
            true
        } else {
            false
        }
    }

    fn try_wrlock_inner(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.has_writer && inner.nr_readers == 0 {
            inner.has_writer = true;
            true
        } else {
            false
        }
    }

    /// Acquires the lock for reading, blocking if unavailable.
    ///
    /// The availability check and, if blocking is required, the enqueue (and
    /// the optional timeout arm) all happen inside [`sched::uthread_yield`]'s
    /// single continuous hold of `self.inner`'s lock — never as a separate
    /// check followed by a later enqueue — so a concurrent `unlock` can never
    /// observe "no writer, no one queued" while a reader has already decided
    /// to block but hasn't enqueued itself yet.
    fn acquire_read(&self, deadline: Option<Deadline>) -> bool {
        let self_addr = std::ptr::from_ref(self) as usize;
        let mut blob: Option<TimeoutBlob> = None;

        sched::uthread_yield(|thread| {
            let mut inner = self.inner.lock();
            if !inner.has_writer && inner.writers.as_ref().unwrap().is_empty() {
                inner.nr_readers += 1;
                return false;
            }

            sched::current().thread_has_blocked(thread, BlockKind::MutexClass);
            inner.readers.as_mut().unwrap().enqueue(thread.clone());
            if let Some(deadline) = deadline {
                blob = Some(TimeoutBlob::arm(deadline, thread.clone(), move |t| {
                    // SAFETY: see `Semaphore::acquire` — `self` outlives
                    // this alarm for the same reason. Arming while `inner`
                    // is still locked above also guarantees the handler's
                    // own lock attempt cannot run until this enqueue has
                    // completed.
                    let rw = unsafe { &*(self_addr as *const RwLock) };
                    rw.inner.lock().readers.as_mut().unwrap().remove(t)
                }));
            }
            true
        });

        match blob {
            Some(blob) => !blob.unset(),
            None => true,
        }
    }

    /// Acquires the lock for writing, blocking if unavailable.
    ///
    /// Same atomicity guarantee as [`RwLock::acquire_read`], checked against
    /// `!has_writer && nr_readers == 0` instead.
    fn acquire_write(&self, deadline: Option<Deadline>) -> bool {
        let self_addr = std::ptr::from_ref(self) as usize;
        let mut blob: Option<TimeoutBlob> = None;

        sched::uthread_yield(|thread| {
            let mut inner = self.inner.lock();
            if !inner.has_writer && inner.nr_readers == 0 {
                inner.has_writer = true;
                return false;
            }

            sched::current().thread_has_blocked(thread, BlockKind::MutexClass);
            inner.writers.as_mut().unwrap().enqueue(thread.clone());
            if let Some(deadline) = deadline {
                blob = Some(TimeoutBlob::arm(deadline, thread.clone(), move |t| {
                    // SAFETY: see `Semaphore::acquire`.
                    let rw = unsafe { &*(self_addr as *const RwLock) };
                    rw.inner.lock().writers.as_mut().unwrap().remove(t)
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

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RwLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RwLock")
            .field("nr_readers", &inner.nr_readers)
            .field("has_writer", &inner.has_writer)
            .finish()
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        let readers_empty = inner.readers.as_ref().is_none_or(|q| q.is_empty());
        let writers_empty = inner.writers.as_ref().is_none_or(|q| q.is_empty());
        debug_assert!(
            readers_empty && writers_empty,
            "dropped an rwlock while threads were still waiting on it"
        );
    }
}
