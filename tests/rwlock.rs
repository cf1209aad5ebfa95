use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use uth_sync::RwLock;

#[test]
fn multiple_readers_concurrent() {
    let rw = Arc::new(RwLock::new());
    assert!(rw.try_rdlock());
    assert!(rw.try_rdlock());
    assert!(!rw.try_wrlock());
    rw.unlock();
    rw.unlock();
    assert!(rw.try_wrlock());
    rw.unlock();
}

#[test]
fn writer_excludes_everyone() {
    let rw = RwLock::new();
    rw.wrlock();
    assert!(!rw.try_rdlock());
    assert!(!rw.try_wrlock());
    rw.unlock();
    assert!(rw.try_rdlock());
    rw.unlock();
}

/// Scenario 6: with 4 readers holding the lock, a writer that arrives
/// queues; once queued, new readers also queue behind it rather than
/// continuing to pile onto the active read set (writer-preferring, so the
/// writer is never starved by a steady stream of new readers). Releasing
/// the original 4 readers lets the writer run; releasing the writer then
/// admits the 4 queued readers together.
#[test]
fn writer_preference_ordering() {
    let rw = Arc::new(RwLock::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));

    for _ in 0..4 {
        assert!(rw.try_rdlock());
    }

    let rw_w = rw.clone();
    let order_w = order.clone();
    let writer = thread::spawn(move || {
        rw_w.wrlock();
        order_w.lock().unwrap().push("writer");
        rw_w.unlock();
    });

    thread::sleep(Duration::from_millis(50));

    let late_readers: Vec<_> = (0..4)
        .map(|_| {
            let rw = rw.clone();
            let order = order.clone();
            thread::spawn(move || {
                rw.rdlock();
                order.lock().unwrap().push("reader2");
                rw.unlock();
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    order.lock().unwrap().push("readers1-done");
    for _ in 0..4 {
        rw.unlock();
    }

    writer.join().unwrap();
    for h in late_readers {
        h.join().unwrap();
    }

    let recorded = order.lock().unwrap();
    let writer_pos = recorded.iter().position(|s| *s == "writer").unwrap();
    let readers1_pos = recorded.iter().position(|s| *s == "readers1-done").unwrap();
    assert!(writer_pos > readers1_pos, "writer must run after the original readers release");
    for (i, s) in recorded.iter().enumerate() {
        if *s == "reader2" {
            assert!(i > writer_pos, "late readers must not run before the preferred writer");
        }
    }
}

#[test]
fn timed_wrlock_times_out_under_reader() {
    let rw = Arc::new(RwLock::new());
    rw.rdlock();

    let rw2 = rw.clone();
    let t = thread::spawn(move || {
        rw2.timed_wrlock(uth_sync::time::Deadline::after(Duration::from_millis(50)))
    });
    assert!(!t.join().unwrap());
    rw.unlock();
}

#[test]
fn concurrent_readers_observe_shared_count() {
    const N: usize = 8;
    let rw = Arc::new(RwLock::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(N));

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let rw = rw.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                rw.rdlock();
                let n = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(n, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                active.fetch_sub(1, Ordering::SeqCst);
                rw.unlock();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(max_seen.load(Ordering::SeqCst) > 1, "readers should have overlapped");
}
