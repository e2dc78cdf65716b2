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

//! Task completion state and the submitter-side future
//!
//! A [`Task`] is the single-shot completion slot shared between the thread
//! that submitted a job and the worker thread that executes it. Exactly one
//! of {value, panic} is stored before the completion signal fires, and the
//! signal fires exactly once, after execution finishes either way.

use crate::{PoolError, Result};
use std::any::Any;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Shared completion state for one submitted job
///
/// Ownership is shared by the submitter (via [`TaskFuture`]) and the
/// executing worker; the execution outcome stored here is authoritative.
pub(crate) struct Task<T> {
    /// Outcome slot, populated exactly once by [`Task::complete`]
    slot: Mutex<Option<thread::Result<T>>>,
    /// Completion signal observed by the future
    done: Condvar,
}

impl<T> Task<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Store the execution outcome and fire the completion signal.
    ///
    /// Called exactly once, from the worker thread, after the job has
    /// finished running or panicked.
    pub(crate) fn complete(&self, outcome: thread::Result<T>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(slot.is_none(), "task completed twice");
        *slot = Some(outcome);
        self.done.notify_all();
    }

    /// Block until the completion signal fires, then take the outcome.
    fn wait_take(&self) -> thread::Result<T> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self.done.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Handle to the eventual outcome of a submitted job
///
/// Returned by [`TaskPool::submit`](crate::TaskPool::submit). Blocking on
/// [`result`](TaskFuture::result) waits for the completion signal and either
/// returns the job's value or re-surfaces the panic the job raised. Taking
/// `self` by value makes "exactly one result per task" a compile-time
/// property.
pub struct TaskFuture<T> {
    task: Arc<Task<T>>,
}

impl<T> TaskFuture<T> {
    pub(crate) fn new(task: Arc<Task<T>>) -> Self {
        Self { task }
    }

    /// Wait for the job to finish and retrieve its outcome
    ///
    /// Returns the job's return value, or [`PoolError::TaskPanicked`] with
    /// the captured panic message if the job panicked.
    pub fn result(self) -> Result<T> {
        match self.task.wait_take() {
            Ok(value) => Ok(value),
            Err(payload) => Err(PoolError::TaskPanicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl<T> std::fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture").finish_non_exhaustive()
    }
}

/// Render a panic payload as text (the usual `&str`/`String` payloads)
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
