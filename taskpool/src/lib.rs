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

//! Worker Pool Task Engine
//!
//! A generic bounded/unbounded task-execution engine: arbitrary units of
//! work run on a fixed set of OS worker threads, and each submission returns
//! a [`TaskFuture`] through which the caller retrieves the result or the
//! propagated failure.
//!
//! # Architecture
//!
//! ```text
//! TaskPool::submit --> FIFO queue --> worker threads
//!       |                                  |
//!       +-------- TaskFuture <-- completion signal
//! ```
//!
//! The pool never logs or retries a failed task; a failure is observable
//! only through its future. Shutdown is cooperative: one sentinel per worker
//! plus a short queue-poll timeout bound the latency for every worker to
//! observe it, and in-flight work always runs to completion.
//!
//! # Example
//!
//! ```
//! use shellbridge_taskpool::TaskPool;
//!
//! let pool = TaskPool::new(2);
//! pool.start()?;
//!
//! let future = pool.submit(|| 6 * 7)?;
//! assert_eq!(future.result()?, 42);
//!
//! pool.shutdown();
//! pool.join();
//! # Ok::<(), shellbridge_taskpool::PoolError>(())
//! ```

mod error;
mod pool;
mod task;

pub use error::{PoolError, Result};
pub use pool::TaskPool;
pub use task::TaskFuture;
