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

//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
///
/// This structure contains all configuration options for the shell bridge
/// server. Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use shellbridge_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("127.0.0.1:2333".parse().unwrap())
///     .with_worker_count(4)
///     .with_shell("/bin/sh")
///     .with_idle_timeout(Some(Duration::from_secs(600)));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,

    /// Number of worker threads in the session pool
    ///
    /// This bounds the number of concurrently active sessions; further
    /// accepted connections queue until a worker frees up.
    pub worker_count: usize,

    /// Capacity of the pending-session queue (0 for unbounded)
    ///
    /// With a bounded queue the accept loop blocks on dispatch once the
    /// queue is full, which in turn stalls new accepts (backpressure).
    pub queue_capacity: usize,

    /// Shell command spawned for each session
    pub shell: PathBuf,

    /// Arguments passed to the shell command
    pub shell_args: Vec<String>,

    /// Read chunk size for the relay loop, in bytes
    pub chunk_size: usize,

    /// Listen backlog for the accepting socket
    pub backlog: usize,

    /// How often the accept loop re-checks the running flag
    pub poll_interval: Duration,

    /// Idle timeout for a session's readiness wait (None for no timeout)
    ///
    /// When set, a session with no traffic in either direction for this
    /// duration is closed as if the peer had disconnected.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:2333".parse().unwrap(),
            worker_count: 10,
            queue_capacity: 0,
            shell: PathBuf::from("/bin/bash"),
            shell_args: Vec::new(),
            chunk_size: 1024,
            backlog: 5,
            poll_interval: Duration::from_millis(100),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the address to bind the listener to
    pub fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set the number of session worker threads
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the pending-session queue capacity (0 for unbounded)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the shell command spawned for each session
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the arguments passed to the shell command
    pub fn with_shell_args(mut self, args: Vec<String>) -> Self {
        self.shell_args = args;
        self
    }

    /// Set the relay read chunk size
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the listen backlog
    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the accept-loop poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-session idle timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".to_string());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.backlog == 0 || self.backlog > i32::MAX as usize {
            return Err("backlog must be between 1 and i32::MAX".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }

        if self.shell.as_os_str().is_empty() {
            return Err("shell must not be empty".to_string());
        }

        Ok(())
    }
}
