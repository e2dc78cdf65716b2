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

//! Shell bridge server implementation
//!
//! The BridgeServer is the main entry point: it owns the worker pool and the
//! dedicated accept thread. The accept loop never performs I/O on accepted
//! connections: it hands each one to the pool and immediately resumes
//! accepting, so one stalled session cannot block new arrivals.

use crate::listener::BridgeListener;
use crate::{BridgeError, Result, ServerConfig, Session};
use shellbridge_taskpool::TaskPool;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Shell bridge server
///
/// Listens on a TCP address and bridges every accepted connection,
/// byte-for-byte in both directions, to its own interactive shell running
/// inside a pseudo-terminal. Concurrency is bounded by the worker pool:
/// one worker thread per active session, further connections queue until a
/// worker frees up.
///
/// Lifecycle: `STOPPED -> LISTENING -> STOPPING -> STOPPED`. A stopped server
/// cannot be restarted; its pool has drained.
///
/// # Example
///
/// ```no_run
/// use shellbridge_server::{BridgeServer, ServerConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::new("127.0.0.1:2333".parse()?).with_worker_count(4);
///     let server = BridgeServer::new(config)?;
///
///     let addr = server.start()?;
///     println!("listening on {addr}");
///
///     // ... run until some external signal ...
///     server.stop()?;
///     Ok(())
/// }
/// ```
pub struct BridgeServer {
    /// Server configuration
    config: ServerConfig,
    /// Session worker pool
    pool: Arc<TaskPool>,
    /// Running flag, shared with the accept thread
    running: Arc<AtomicBool>,
    /// Accept thread handle, joined by `stop`
    accept_handle: Mutex<Option<JoinHandle<()>>>,
    /// Bound address while listening
    local_addr: Mutex<Option<SocketAddr>>,
}

impl BridgeServer {
    /// Create a new server with the given configuration
    ///
    /// Validates the configuration and builds the worker pool; the listener
    /// is not bound until [`start`](BridgeServer::start).
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate().map_err(BridgeError::InvalidConfig)?;

        let pool = Arc::new(TaskPool::with_queue_capacity(
            config.worker_count,
            config.queue_capacity,
        ));

        Ok(Self {
            config,
            pool,
            running: Arc::new(AtomicBool::new(false)),
            accept_handle: Mutex::new(None),
            local_addr: Mutex::new(None),
        })
    }

    /// Bind the listener and begin accepting connections
    ///
    /// Binds synchronously, so a bind/listen failure surfaces here and
    /// nothing is left running, then spawns the accept thread. Returns
    /// the bound address, which is the way to learn the port when binding
    /// to port 0.
    pub fn start(&self) -> Result<SocketAddr> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyRunning);
        }

        match self.try_start() {
            Ok(addr) => Ok(addr),
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn try_start(&self) -> Result<SocketAddr> {
        if self.pool.is_shutting_down() {
            return Err(BridgeError::NotRunning);
        }
        self.pool.start()?;

        let listener = BridgeListener::bind(self.config.bind_address, self.config.backlog)?;
        let addr = listener.local_addr();
        *lock(&self.local_addr) = Some(addr);

        info!("shell bridge server started on {addr}");

        let pool = self.pool.clone();
        let config = self.config.clone();
        let running = self.running.clone();
        let handle = thread::Builder::new()
            .name("bridge-accept".to_string())
            .spawn(move || accept_loop(listener, pool, config, running))
            .map_err(BridgeError::Io)?;
        *lock(&self.accept_handle) = Some(handle);

        Ok(addr)
    }

    /// Stop accepting connections and drain the worker pool
    ///
    /// Joins the accept thread (it observes the flag within one poll
    /// interval), then shuts down and joins the pool. In-flight sessions are
    /// not forcibly terminated; they end when either of their endpoints
    /// closes, and `stop` waits for that.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::NotRunning);
        }

        info!("stopping shell bridge server");

        if let Some(handle) = lock(&self.accept_handle).take() {
            let _ = handle.join();
        }
        *lock(&self.local_addr) = None;

        self.pool.shutdown();
        self.pool.join();

        info!("shell bridge server stopped");
        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound address while the server is listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Approximate number of idle session workers
    pub fn idle_worker_count(&self) -> usize {
        self.pool.idle_worker_count()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for BridgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeServer")
            .field("local_addr", &self.local_addr())
            .field("running", &self.is_running())
            .field("idle_workers", &self.idle_worker_count())
            .finish()
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            warn!("BridgeServer dropped while still running");
        }
    }
}

/// The dedicated accept loop
///
/// Dispatches every accepted connection into the pool and resumes accepting;
/// the per-session future is intentionally dropped: nobody waits on it, and
/// session failures are observable only through the log.
fn accept_loop(
    listener: BridgeListener,
    pool: Arc<TaskPool>,
    config: ServerConfig,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.poll_accept(config.poll_interval) {
            Ok(Some(stream)) => {
                let peer = peer_name(&stream);
                info!(%peer, "connection accepted");

                let task_config = config.clone();
                if let Err(err) = pool.submit(move || handle_session(stream, &task_config)) {
                    warn!(%peer, error = %err, "failed to dispatch session");
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "failed to accept connection");
                // Back off on errors to avoid a tight loop
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    info!("accept loop terminated");
}

/// Per-session task body, run on a pool worker
///
/// Any setup or relay failure is caught here and confined to this session;
/// it never reaches the accept loop or other sessions.
fn handle_session(stream: TcpStream, config: &ServerConfig) {
    let peer = peer_name(&stream);
    match Session::open(stream, config).and_then(Session::run) {
        Ok(()) => info!(%peer, "connection closed"),
        Err(err) => error!(%peer, error = %err, "session failed"),
    }
}

fn peer_name(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
