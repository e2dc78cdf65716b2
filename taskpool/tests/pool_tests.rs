//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Integration tests for the shellbridge-taskpool crate

use shellbridge_taskpool::{PoolError, TaskPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_future_returns_job_value() {
    let pool = TaskPool::new(2);
    pool.start().unwrap();

    let future = pool.submit(|| vec![1u8, 2, 3]).unwrap();
    assert_eq!(future.result().unwrap(), vec![1, 2, 3]);

    pool.shutdown();
    pool.join();
}

#[test]
fn test_future_surfaces_job_panic() {
    let pool = TaskPool::new(1);
    pool.start().unwrap();

    let future = pool.submit(|| -> usize { panic!("task exploded") }).unwrap();
    match future.result() {
        Err(PoolError::TaskPanicked { message }) => {
            assert!(message.contains("task exploded"));
        }
        other => panic!("expected TaskPanicked, got {other:?}"),
    }

    // A panicking job must not take its worker down with it.
    let future = pool.submit(|| 7usize).unwrap();
    assert_eq!(future.result().unwrap(), 7);

    pool.shutdown();
    pool.join();
}

#[test]
fn test_submit_after_shutdown_is_rejected() {
    let pool = TaskPool::new(2);
    pool.start().unwrap();
    pool.shutdown();

    let result = pool.submit(|| ());
    assert!(matches!(result, Err(PoolError::ShuttingDown)));

    pool.join();
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = TaskPool::new(3);
    pool.start().unwrap();

    pool.shutdown();
    pool.shutdown();

    // All workers exit despite the doubled call; join must not hang.
    pool.join();
    assert!(pool.is_shutting_down());
}

#[test]
fn test_bounded_queue_applies_backpressure() {
    let pool = Arc::new(TaskPool::with_queue_capacity(1, 1));
    pool.start().unwrap();

    // Occupy the single worker until released.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    pool.submit(move || {
        let _ = release_rx.recv();
    })
    .unwrap();
    thread::sleep(Duration::from_millis(100));

    // Fill the single queue slot.
    pool.submit(|| ()).unwrap();

    // The next submission must block until the worker frees a slot.
    let unblocked = Arc::new(AtomicBool::new(false));
    let submitter = {
        let pool = pool.clone();
        let unblocked = unblocked.clone();
        thread::spawn(move || {
            pool.submit(|| ()).unwrap();
            unblocked.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(
        !unblocked.load(Ordering::SeqCst),
        "submit should block while the bounded queue is full"
    );

    release_tx.send(()).unwrap();
    submitter.join().unwrap();
    assert!(unblocked.load(Ordering::SeqCst));

    pool.wait_completion();
    pool.shutdown();
    pool.join();
}

#[test]
fn test_blocked_submit_leaves_pool_responsive() {
    let pool = Arc::new(TaskPool::with_queue_capacity(1, 1));
    pool.start().unwrap();

    // Occupy the single worker; on release the job consults pool state,
    // which must not wait on anything a blocked submitter holds.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let observer = pool.clone();
    pool.submit(move || {
        let _ = release_rx.recv();
        assert!(!observer.is_shutting_down());
    })
    .unwrap();
    thread::sleep(Duration::from_millis(100));

    // Fill the single queue slot, then block a second submitter on it.
    pool.submit(|| ()).unwrap();

    let submitted = Arc::new(AtomicBool::new(false));
    let submitter = {
        let pool = pool.clone();
        let submitted = submitted.clone();
        thread::spawn(move || {
            let future = pool.submit(|| 7usize).unwrap();
            submitted.store(true, Ordering::SeqCst);
            future.result().unwrap()
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(!submitted.load(Ordering::SeqCst));

    // Releasing the worker must drain the queue and unblock the submitter;
    // a submitter stalled on a full queue must never freeze the pool.
    release_tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !submitted.load(Ordering::SeqCst) {
        assert!(
            Instant::now() < deadline,
            "submit never unblocked after the queue drained"
        );
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(submitter.join().unwrap(), 7);

    pool.shutdown();
    pool.join();
}

#[test]
fn test_jobs_run_concurrently_up_to_worker_count() {
    let pool = TaskPool::new(4);
    pool.start().unwrap();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let futures: Vec<_> = (0..8)
        .map(|_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            pool.submit(move || {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    for future in futures {
        future.result().unwrap();
    }

    let observed = peak.load(Ordering::SeqCst);
    assert!(
        observed > 1 && observed <= 4,
        "expected concurrent execution bounded by the pool size, saw {observed}"
    );

    pool.shutdown();
    pool.join();
}
