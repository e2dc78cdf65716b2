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

//! Fixed-size worker pool over a bounded or unbounded FIFO queue
//!
//! Workers pull entries with a short timeout so they observe shutdown within
//! a bounded interval even when the queue is idle; on shutdown one sentinel
//! per spawned worker guarantees a wake-up. In-flight jobs always run to
//! completion, and a job failure is captured into its task slot rather than
//! unwinding the worker.

use crate::task::{Task, TaskFuture};
use crate::{PoolError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a worker blocks on the queue before re-checking the shutdown
/// flag. Bounds the latency to observe shutdown without a forced wake.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One queue entry: real work, or a shutdown sentinel that wakes one worker
/// purely so it can exit.
enum QueueEntry {
    Job(Box<dyn FnOnce() + Send + 'static>),
    Shutdown,
}

/// Worker bookkeeping, guarded by a mutex
///
/// Never held across a queue send; blocking operations and the worker loop
/// rely only on the lock-free fields of [`PoolShared`].
struct PoolControl {
    /// Target number of workers (spawn count for `start`)
    target_workers: usize,
    /// Whether `start` has spawned the workers
    started: bool,
}

/// State shared between the pool handle and its worker threads
struct PoolShared {
    queue_tx: Sender<QueueEntry>,
    queue_rx: Receiver<QueueEntry>,
    control: Mutex<PoolControl>,
    /// Once set, no new submissions are accepted
    shutdown: AtomicBool,
    /// Submissions admitted but not yet landed on the queue. `shutdown`
    /// enqueues its sentinels only after this drains to zero, so an
    /// admitted job always precedes every sentinel in the queue.
    inflight: AtomicUsize,
    /// Jobs enqueued but not yet finished, for `wait_completion`.
    /// Sentinels are never counted here.
    pending: Mutex<usize>,
    drained: Condvar,
    /// Workers currently executing a job (best effort, observability only)
    busy: AtomicUsize,
    /// Workers spawned so far; also the sentinel count on shutdown
    spawned: AtomicUsize,
}

impl PoolShared {
    fn job_finished(&self) {
        let mut pending = lock(&self.pending);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// A fixed-size worker-thread pool executing deferred jobs
///
/// Jobs are arbitrary `FnOnce` closures; submitting one returns a
/// [`TaskFuture`] through which the caller can later retrieve the value or
/// the captured failure. The queue is unbounded by default; a bounded queue
/// makes `submit` block when full (backpressure).
///
/// # Example
///
/// ```
/// use shellbridge_taskpool::TaskPool;
///
/// let pool = TaskPool::new(4);
/// pool.start().unwrap();
///
/// let future = pool.submit(|| 2 + 2).unwrap();
/// assert_eq!(future.result().unwrap(), 4);
///
/// pool.shutdown();
/// pool.join();
/// ```
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Create a pool with an unbounded task queue
    pub fn new(worker_count: usize) -> Self {
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        Self::build(worker_count, queue_tx, queue_rx)
    }

    /// Create a pool with a bounded task queue
    ///
    /// With a bounded queue, `submit` blocks the caller while the queue is
    /// full and unblocks once a worker consumes an entry. A capacity of zero
    /// means unbounded.
    pub fn with_queue_capacity(worker_count: usize, capacity: usize) -> Self {
        let (queue_tx, queue_rx) = if capacity == 0 {
            crossbeam_channel::unbounded()
        } else {
            crossbeam_channel::bounded(capacity)
        };
        Self::build(worker_count, queue_tx, queue_rx)
    }

    fn build(
        worker_count: usize,
        queue_tx: Sender<QueueEntry>,
        queue_rx: Receiver<QueueEntry>,
    ) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                queue_tx,
                queue_rx,
                control: Mutex::new(PoolControl {
                    target_workers: worker_count,
                    started: false,
                }),
                shutdown: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
                pending: Mutex::new(0),
                drained: Condvar::new(),
                busy: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker threads
    ///
    /// Idempotent before any work has been dispatched; calling it again once
    /// tasks are running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut control = lock(&self.shared.control);
        if control.started {
            return Ok(());
        }
        control.started = true;
        let count = control.target_workers;
        drop(control);
        self.spawn_workers(count)
    }

    /// Submit a job and receive a future for its outcome
    ///
    /// Fails with [`PoolError::ShuttingDown`] once shutdown has begun. On a
    /// bounded queue this blocks while the queue is full; otherwise it
    /// enqueues and returns immediately.
    pub fn submit<F, T>(&self, job: F) -> Result<TaskFuture<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        // Admission: raise inflight before reading the flag, so `shutdown`
        // (which sets the flag, then waits for inflight to drain) either
        // rejects this submission here or waits for its send to land.
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        if self.shared.shutdown.load(Ordering::SeqCst) {
            self.shared.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShuttingDown);
        }

        let task = Arc::new(Task::new());
        let future = TaskFuture::new(task.clone());
        let entry = QueueEntry::Job(Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            task.complete(outcome);
        }));

        *lock(&self.shared.pending) += 1;
        // Blocks here on a full bounded queue until a worker consumes an
        // entry. No lock is held across the send: workers and other pool
        // operations stay fully responsive while a submitter waits.
        let sent = self.shared.queue_tx.send(entry);
        self.shared.inflight.fetch_sub(1, Ordering::SeqCst);
        if sent.is_err() {
            let mut pending = lock(&self.shared.pending);
            *pending = pending.saturating_sub(1);
            return Err(PoolError::ShuttingDown);
        }
        Ok(future)
    }

    /// Block until every dispatched job has signaled completion
    ///
    /// A flush point for batch-style use; returns immediately when nothing
    /// is pending.
    pub fn wait_completion(&self) {
        let mut pending = lock(&self.shared.pending);
        while *pending > 0 {
            pending = self
                .shared
                .drained
                .wait(pending)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Begin shutting the pool down
    ///
    /// Idempotent. Marks the pool draining and enqueues one sentinel per
    /// spawned worker so each one is guaranteed a wake-up even while idle.
    /// In-flight jobs are never interrupted.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        // Let admitted submissions land first: a job enqueued before its
        // sentinel is always consumed, never stranded behind one.
        while self.shared.inflight.load(Ordering::SeqCst) > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let spawned = self.shared.spawned.load(Ordering::Relaxed);
        for _ in 0..spawned {
            let _ = self.shared.queue_tx.send(QueueEntry::Shutdown);
        }
    }

    /// Join all worker threads
    ///
    /// Call after [`shutdown`](TaskPool::shutdown); blocks until every
    /// worker has exited. Workers busy with a long-running job are waited
    /// for, not interrupted.
    pub fn join(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Adjust the target worker count
    ///
    /// Before `start` this sets the spawn count. After `start`, raising the
    /// target spawns the additional workers immediately; lowering it only
    /// records the new target. Fails once shutdown has begun.
    pub fn set_worker_count(&self, worker_count: usize) -> Result<()> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }
        let mut control = lock(&self.shared.control);
        control.target_workers = worker_count;
        let started = control.started;
        drop(control);

        if started {
            let spawned = self.shared.spawned.load(Ordering::Relaxed);
            if worker_count > spawned {
                self.spawn_workers(worker_count - spawned)?;
            }
        }
        Ok(())
    }

    /// Approximate count of workers not currently executing a job
    ///
    /// Best effort and non-atomic; for observability only.
    pub fn idle_worker_count(&self) -> usize {
        let spawned = self.shared.spawned.load(Ordering::Relaxed);
        let busy = self.shared.busy.load(Ordering::Relaxed);
        spawned.saturating_sub(busy)
    }

    /// Check whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    fn spawn_workers(&self, count: usize) -> Result<()> {
        let mut workers = lock(&self.workers);
        for _ in 0..count {
            let shared = self.shared.clone();
            let handle = thread::Builder::new()
                .name("taskpool-worker".to_string())
                .spawn(move || worker_loop(shared))
                .map_err(PoolError::WorkerSpawn)?;
            self.shared.spawned.fetch_add(1, Ordering::Relaxed);
            workers.push(handle);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("spawned", &self.shared.spawned.load(Ordering::Relaxed))
            .field("idle", &self.idle_worker_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Leave no worker spinning on the queue with no owner.
        self.shutdown();
    }
}

/// The per-worker pull loop
///
/// Waits on the queue with a short timeout, re-checking the shutdown flag on
/// each timeout; exits on a sentinel or an observed shutdown. Job failures
/// are captured inside the job wrapper, never logged or retried here.
fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        match shared.queue_rx.recv_timeout(QUEUE_POLL_INTERVAL) {
            Ok(QueueEntry::Job(job)) => {
                shared.busy.fetch_add(1, Ordering::Relaxed);
                job();
                shared.busy.fetch_sub(1, Ordering::Relaxed);
                shared.job_finished();
            }
            Ok(QueueEntry::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                // Exit without a sentinel only once no admitted job can
                // still be queued or land; otherwise keep polling.
                if shared.shutdown.load(Ordering::SeqCst)
                    && shared.inflight.load(Ordering::SeqCst) == 0
                    && shared.queue_rx.is_empty()
                {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Acquire a mutex, recovering from poisoning (a panicking job cannot hold
/// pool locks, so the data is always consistent)
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
