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

//! Error types for the worker pool

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Worker pool error types
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has begun shutting down and no longer accepts work
    #[error("pool is shutting down")]
    ShuttingDown,

    /// A submitted task panicked while executing
    ///
    /// The panic is caught on the worker thread and re-surfaced through the
    /// task's future; it never unwinds across the pool.
    #[error("task panicked: {message}")]
    TaskPanicked {
        /// The panic payload, rendered as text
        message: String,
    },

    /// Spawning a worker thread failed
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl PoolError {
    /// Check if the error indicates the pool rejected the operation
    pub fn is_rejection(&self) -> bool {
        matches!(self, PoolError::ShuttingDown)
    }

    /// Check if the error carries a task failure
    pub fn is_task_failure(&self) -> bool {
        matches!(self, PoolError::TaskPanicked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PoolError::ShuttingDown.is_rejection());
        assert!(!PoolError::ShuttingDown.is_task_failure());

        let err = PoolError::TaskPanicked {
            message: "boom".to_string(),
        };
        assert!(err.is_task_failure());
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::TaskPanicked {
            message: "index out of bounds".to_string(),
        };
        assert_eq!(err.to_string(), "task panicked: index out of bounds");
        assert_eq!(PoolError::ShuttingDown.to_string(), "pool is shutting down");
    }
}
