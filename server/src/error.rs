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

//! Error types for the shell bridge server

use nix::errno::Errno;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Shell bridge server error types
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error on the client connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level system call failure
    #[error("system error: {0}")]
    Sys(#[from] Errno),

    /// Pseudo-terminal allocation failed (typically descriptor exhaustion)
    #[error("failed to allocate pty: {0}")]
    PtyAllocation(#[source] Errno),

    /// Spawning the shell child process failed
    #[error("failed to spawn shell '{command}': {source}")]
    SpawnFailed {
        /// The shell command that failed to spawn
        command: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Readiness wait on the session descriptors failed
    #[error("readiness wait failed: {0}")]
    Poll(#[source] Errno),

    /// Server is already running
    #[error("server already running")]
    AlreadyRunning,

    /// Server is not running
    #[error("server not running")]
    NotRunning,

    /// Worker pool error
    #[error("worker pool error: {0}")]
    Pool(#[from] shellbridge_taskpool::PoolError),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Check if the error is a per-connection failure
    ///
    /// Connection errors are confined to one session; they trigger that
    /// session's cleanup and never affect the accept loop.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_) | BridgeError::Poll(_) | BridgeError::Sys(_)
        )
    }

    /// Check if the error indicates resource exhaustion during session setup
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            BridgeError::PtyAllocation(_) | BridgeError::SpawnFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_connection_error() {
        let err = BridgeError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(err.is_connection_error());
        assert!(BridgeError::Poll(Errno::EBADF).is_connection_error());
        assert!(!BridgeError::AlreadyRunning.is_connection_error());
    }

    #[test]
    fn test_error_is_resource_exhaustion() {
        assert!(BridgeError::PtyAllocation(Errno::EMFILE).is_resource_exhaustion());

        let err = BridgeError::SpawnFailed {
            command: "/bin/missing".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_resource_exhaustion());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            BridgeError::AlreadyRunning.to_string(),
            "server already running"
        );
        assert_eq!(BridgeError::NotRunning.to_string(), "server not running");

        let err = BridgeError::SpawnFailed {
            command: "/bin/missing".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/bin/missing"));
    }
}
