mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uth_sync::time::Deadline;
use uth_sync::{CondVar, Mutex};

struct Shared {
    mtx: Mutex,
    cv: CondVar,
    flag: std::cell::UnsafeCell<u32>,
}

unsafe impl Sync for Shared {}

/// Scenario 4: CV ping-pong between two threads over a shared flag. Both
/// threads must return exactly once; a lost wakeup or a stuck waiter would
/// hang the test.
#[test]
fn ping_pong_terminates() {
    support::init_tracing();
    let shared = Arc::new(Shared {
        mtx: Mutex::new(),
        cv: CondVar::new(),
        flag: std::cell::UnsafeCell::new(0),
    });

    let s2 = shared.clone();
    let t2 = thread::spawn(move || {
        s2.mtx.lock();
        unsafe { *s2.flag.get() = 1 };
        s2.cv.signal();
        while unsafe { *s2.flag.get() } == 1 {
            s2.cv.wait(&s2.mtx);
        }
        s2.mtx.unlock();
    });

    shared.mtx.lock();
    while unsafe { *shared.flag.get() } == 0 {
        shared.cv.wait(&shared.mtx);
    }
    unsafe { *shared.flag.get() = 0 };
    shared.cv.signal();
    shared.mtx.unlock();

    t2.join().unwrap();
}

/// Scenario 5: 16 waiters block on a condition variable for `flag == 1`;
/// the main thread sets it and broadcasts. All 16 must return, each having
/// reacquired the mutex in turn.
#[test]
fn broadcast_wakes_all_waiters() {
    const N: usize = 16;

    struct State {
        mtx: Mutex,
        cv: CondVar,
        flag: std::cell::UnsafeCell<u32>,
        waiting: std::cell::UnsafeCell<u32>,
        woken: std::cell::UnsafeCell<u32>,
    }
    unsafe impl Sync for State {}

    let state = Arc::new(State {
        mtx: Mutex::new(),
        cv: CondVar::new(),
        flag: std::cell::UnsafeCell::new(0),
        waiting: std::cell::UnsafeCell::new(0),
        woken: std::cell::UnsafeCell::new(0),
    });

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let state = state.clone();
            thread::spawn(move || {
                state.mtx.lock();
                unsafe { *state.waiting.get() += 1 };
                while unsafe { *state.flag.get() } == 0 {
                    state.cv.wait(&state.mtx);
                }
                unsafe { *state.woken.get() += 1 };
                state.mtx.unlock();
            })
        })
        .collect();

    loop {
        state.mtx.lock();
        let ready = unsafe { *state.waiting.get() } == N as u32;
        state.mtx.unlock();
        if ready {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    // Give the last waiter time to actually reach `cv.wait` past the count
    // bump above.
    thread::sleep(Duration::from_millis(20));

    state.mtx.lock();
    unsafe { *state.flag.get() = 1 };
    state.cv.broadcast();
    state.mtx.unlock();

    for h in handles {
        h.join().unwrap();
    }

    state.mtx.lock();
    assert_eq!(unsafe { *state.woken.get() }, N as u32);
    state.mtx.unlock();
}

#[test]
fn broadcast_on_empty_condvar_is_a_noop() {
    let cv = CondVar::new();
    cv.broadcast();
    cv.signal();
}

#[test]
fn timed_wait_times_out_and_still_holds_mutex() {
    let mtx = Mutex::new();
    let cv = CondVar::new();

    mtx.lock();
    let woke = cv.timed_wait(&mtx, Deadline::after(Duration::from_millis(50)));
    assert!(!woke);
    // Mutex must be held again on return, timeout or not.
    assert!(!mtx.trylock());
    mtx.unlock();
}

/// Scenario: `wait_recurse` surrenders and restores the full recursion
/// depth across a wait.
#[test]
fn wait_recurse_restores_recursion_depth() {
    use uth_sync::RecursiveMutex;

    let r_mtx = Arc::new(RecursiveMutex::new());
    let cv = Arc::new(CondVar::new());

    r_mtx.lock();
    r_mtx.lock();

    let r2 = r_mtx.clone();
    let cv2 = cv.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        r2.lock();
        cv2.signal();
        r2.unlock();
    });

    cv.wait_recurse(&r_mtx);
    t.join().unwrap();

    // Still recursively held twice, same as before the wait.
    assert!(r_mtx.trylock());
    r_mtx.unlock();
    r_mtx.unlock();
    r_mtx.unlock();
    assert!(r_mtx.trylock());
    r_mtx.unlock();
}
