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

//! Session Bridge Server
//!
//! A threaded telnet-style shell bridge: the server listens on a TCP
//! address and bridges each accepted connection, byte-for-byte in both
//! directions, to an interactive shell running inside a pseudo-terminal.
//! Resource usage is bounded by a fixed worker-thread pool, one worker per
//! concurrently active session.
//!
//! The relay is a raw byte pipe, not a protocol-compliant terminal
//! emulator: no option negotiation, no line-mode switching, no framing.
//! The wire carries exactly what the spawned shell produces and consumes.
//!
//! # Architecture
//!
//! ```text
//! BridgeServer (accept thread)
//!     | dispatch
//! TaskPool (worker threads)
//!     | one task per connection
//! Session: socket <-> poll(2) relay <-> PTY master <-> shell child
//! ```
//!
//! # Example
//!
//! ```no_run
//! use shellbridge_server::{BridgeServer, ServerConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("127.0.0.1:2333".parse()?)
//!         .with_worker_count(10)
//!         .with_shell("/bin/bash");
//!
//!     let server = BridgeServer::new(config)?;
//!     let addr = server.start()?;
//!     println!("shell bridge listening on {addr}");
//!
//!     // ... wait for a shutdown signal ...
//!     server.stop()?;
//!     Ok(())
//! }
//! ```

#![cfg(unix)]

mod config;
mod error;
mod listener;
mod server;
mod session;

pub use config::ServerConfig;
pub use error::{BridgeError, Result};
pub use server::BridgeServer;
pub use session::{Session, SessionState};
