mod support;

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uth_sync::time::Deadline;
use uth_sync::Semaphore;

/// Scenario 1: sem handoff. T1 blocks on a count=0 semaphore; main releases
/// a unit once T1 is observed blocked; T1 must resume and the count must
/// settle back at zero (the unit was handed off, not left sitting free).
#[test]
fn handoff_wakes_blocked_waiter() {
    support::init_tracing();
    let sem = Arc::new(Semaphore::new(0));
    let sem2 = sem.clone();

    let t = thread::spawn(move || {
        sem2.down();
    });

    thread::sleep(Duration::from_millis(50));
    sem.up();
    t.join().unwrap();

    assert!(!sem.trydown(), "handed-off unit should not remain free");
}

#[test]
fn trydown_never_blocks() {
    let sem = Semaphore::new(0);
    assert!(!sem.trydown());
    sem.up();
    assert!(sem.trydown());
    assert!(!sem.trydown());
}

/// Scenario 7: timed down. No `up` ever occurs; the timed wait must give up
/// at roughly the deadline, and leave no ghost waiter behind.
#[test]
fn timed_down_times_out_and_leaves_no_ghost_waiter() {
    support::init_tracing();
    let sem = Semaphore::new(0);

    let start = std::time::Instant::now();
    let ok = sem.timed_down(Deadline::after(Duration::from_millis(50)));
    let elapsed = start.elapsed();

    assert!(!ok);
    assert!(elapsed >= Duration::from_millis(40));

    sem.up();
    assert!(sem.trydown(), "subsequent up should leave exactly one free unit");
    assert!(!sem.trydown());
}

#[test]
fn timed_down_succeeds_when_unit_already_available() {
    let sem = Semaphore::new(1);
    assert!(sem.timed_down(Deadline::after(Duration::from_secs(5))));
}

#[test]
fn many_waiters_each_get_exactly_one_unit() {
    const N: usize = 20;
    let sem = Arc::new(Semaphore::new(0));

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let sem = sem.clone();
            thread::spawn(move || sem.down())
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    for _ in 0..N {
        sem.up();
    }

    for h in handles {
        h.join().unwrap();
    }
    assert!(!sem.trydown());
}
