//! The timeout helper: `spec.md` §4.2.
//!
//! A timed wait arms a one-shot alarm *before* yielding. The alarm's
//! handler and the wait path both take the same spinlock to touch the wait
//! queue, so whichever of "the waiter is enqueued, the handler removes it"
//! (timeout wins) or "a waker already popped the waiter, the handler finds
//! it absent" (signal/handoff wins) happens is forced to serialize — there
//! is no interleaving that loses a wakeup or double-wakes a thread.
//!
//! `spec.md` treats the alarm subsystem itself as an external collaborator
//! ("assumed to provide absolute-time one-shot alarms with a cancel
//! operation whose return guarantees the handler has finished or will never
//! fire"). Without a real vcore/alarm subsystem to depend on, this module
//! provides a minimal standalone one: one dedicated OS thread per armed
//! timeout, sleeping until the deadline, with cancellation arbitrated by a
//! small state machine under a `Mutex`+`Condvar` so `unset` can give the
//! same guarantee the spec asks of `unset_timeout`.

use crate::sched;
use crate::thread::ThreadHandle;
use crate::time::Deadline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmState {
    Pending,
    Cancelled,
    Firing,
    Fired,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<AlarmState>,
    settled: Condvar,
}

/// A single armed, one-shot alarm.
#[derive(Debug)]
struct AlarmHandle {
    inner: Arc<Inner>,
    thread: Option<JoinHandle<()>>,
}

impl AlarmHandle {
    fn arm(deadline: Deadline, handler: impl FnOnce() + Send + 'static) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(AlarmState::Pending),
            settled: Condvar::new(),
        });
        let inner_thread = inner.clone();
        let thread = std::thread::Builder::new()
            .name("uth-sync-alarm".to_owned())
            .spawn(move || {
                let now = std::time::Instant::now();
                let target = deadline.instant();
                if target > now {
                    std::thread::sleep(target - now);
                }

                let mut state = inner_thread.state.lock().unwrap();
                if *state == AlarmState::Pending {
                    *state = AlarmState::Firing;
                    drop(state);
                    tracing::trace!("alarm firing");
                    handler();
                    *inner_thread.state.lock().unwrap() = AlarmState::Fired;
                }
                // else: raced with cancellation; `unset` already moved us
                // to `Cancelled` and the handler must not run.
                inner_thread.settled.notify_all();
            })
            .expect("failed to spawn timeout alarm thread");
        Self {
            inner,
            thread: Some(thread),
        }
    }

    /// Cancels the alarm. On return, `handler` has either run to
    /// completion or will never run.
    fn unset(mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            match *state {
                AlarmState::Pending => *state = AlarmState::Cancelled,
                AlarmState::Cancelled | AlarmState::Fired => {}
                AlarmState::Firing => {
                    state = self
                        .inner
                        .settled
                        .wait_while(state, |s| *s == AlarmState::Firing)
                        .unwrap();
                    debug_assert_eq!(*state, AlarmState::Fired);
                }
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The transient, per-wait record `spec.md` §3 calls the "timeout blob":
/// whether the alarm fired before the waiter was otherwise woken, plus the
/// machinery to arm and later retire the alarm.
///
/// Lives on the waiter's stack for the duration of a single timed call, from
/// [`TimeoutBlob::arm`] until [`TimeoutBlob::unset`] returns — exactly the
/// lifetime `spec.md` specifies.
#[derive(Debug)]
pub(crate) struct TimeoutBlob {
    timed_out: Arc<AtomicBool>,
    alarm: AlarmHandle,
}

impl TimeoutBlob {
    /// Arms a one-shot alarm for `thread` at `deadline`.
    ///
    /// `try_remove` must, under whichever spinlock guards the relevant
    /// [`crate::queue::SyncQueue`], attempt to remove `thread` from it and
    /// return whether it was still present — i.e. it performs exactly steps
    /// 1-3 of `spec.md`'s `timeout_handler` (acquire lock, remove, release
    /// lock). If it returns `true`, this makes `thread` runnable, matching
    /// step 4.
    pub(crate) fn arm(
        deadline: Deadline,
        thread: ThreadHandle,
        try_remove: impl FnOnce(&ThreadHandle) -> bool + Send + 'static,
    ) -> Self {
        let timed_out = Arc::new(AtomicBool::new(false));
        let timed_out_in_handler = timed_out.clone();
        let thread_in_handler = thread;
        let alarm = AlarmHandle::arm(deadline, move || {
            if try_remove(&thread_in_handler) {
                timed_out_in_handler.store(true, Ordering::SeqCst);
                sched::current().make_runnable(thread_in_handler);
            }
        });
        Self { timed_out, alarm }
    }

    /// Cancels the alarm — guaranteed, on return, that the handler has
    /// either completed or will never run — and reports whether it fired
    /// before being cancelled.
    pub(crate) fn unset(self) -> bool {
        self.alarm.unset();
        self.timed_out.load(Ordering::SeqCst)
    }
}
