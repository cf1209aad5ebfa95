//! Synchronization primitives for a cooperatively scheduled uthread runtime.
//!
//! This crate implements the primitives user code actually programs
//! against — counting semaphores, non-recursive and recursive mutexes,
//! condition variables, and reader-writer locks — on top of two small
//! pluggable abstractions:
//!
//! - [`sched::Scheduler`]: the "2LS" (second-level scheduler). It owns the
//!   decision of how a blocked thread is represented and resumed. A default,
//!   OS-thread-backed implementation ([`sched::NativeScheduler`]) is
//!   installed automatically so the crate is usable standalone; a real
//!   uthread runtime can install its own via [`sched::install_scheduler`].
//! - [`queue::SyncQueue`]: the per-primitive wait queue. The default is
//!   FIFO; a 2LS may supply its own via [`sched::Scheduler::new_sync_queue`].
//!
//! None of the primitives here preempt. A blocking call either returns
//! immediately or asks the scheduler to suspend the calling thread; the
//! scheduler alone decides what runs next. See [`thread::assert_can_block`]
//! for the precondition every blocking entry point checks.
//!
//! # Timeouts
//!
//! Every blocking operation has a `timed_*` counterpart that takes a
//! [`time::Deadline`]. A timed call races a one-shot alarm ([`timeout`])
//! against a signal/handoff; exactly one of them wins, and the loser's
//! observable effect (a spurious wakeup, a lost resource) never happens.
//! See `timeout` module docs for the mechanism.

#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

mod once;
mod queue;
pub mod sched;
mod spinlock;
pub mod thread;
pub mod time;
pub mod timeout;

mod condvar;
mod mutex;
mod recursive_mutex;
mod rwlock;
mod sem;

pub use condvar::CondVar;
pub use mutex::Mutex;
pub use queue::SyncQueue;
pub use recursive_mutex::RecursiveMutex;
pub use rwlock::RwLock;
pub use sem::Semaphore;
pub use thread::ThreadHandle;
