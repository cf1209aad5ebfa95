use std::cell::UnsafeCell;
use std::sync::Arc;
use std::thread;
use uth_sync::Mutex;

/// Shared counter protected only by the mutex's critical section, not by a
/// `std::sync::Mutex<T>` wrapper — mirroring the C API, where the lock
/// guards externally-owned data by convention rather than by ownership.
struct Counter(UnsafeCell<u64>);

unsafe impl Sync for Counter {}

/// Scenario 2: 8 threads each perform 10 000 `{lock; x++; unlock}`
/// iterations on a shared integer starting at 0; the final value must be
/// exactly 80 000, proving the critical sections never overlapped.
#[test]
fn mutual_exclusion_under_contention() {
    const THREADS: usize = 8;
    const ITERS: usize = 10_000;

    let mtx = Arc::new(Mutex::new());
    let counter = Arc::new(Counter(UnsafeCell::new(0)));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let mtx = mtx.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..ITERS {
                    mtx.lock();
                    unsafe {
                        *counter.0.get() += 1;
                    }
                    mtx.unlock();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(unsafe { *counter.0.get() }, (THREADS * ITERS) as u64);
}

#[test]
fn trylock_fails_while_held() {
    let mtx = Mutex::new();
    mtx.lock();
    assert!(!mtx.trylock());
    mtx.unlock();
    assert!(mtx.trylock());
    mtx.unlock();
}

#[test]
fn default_is_unlocked() {
    let mtx = Mutex::default();
    assert!(mtx.trylock());
    mtx.unlock();
}
