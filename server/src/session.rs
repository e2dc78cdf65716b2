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

//! One bridged connection: client socket <-> pseudo-terminal <-> shell child
//!
//! A [`Session`] owns its socket, the PTY master descriptor and the child
//! process exclusively; it lives entirely on the worker thread executing it
//! and is never shared. The relay is a transparent byte pipe with no
//! interpretation, cross-iteration buffering or framing; back-pressure comes
//! from the readiness wait and the OS socket/PTY buffers.
//!
//! Cleanup, closing both descriptors and force-terminating the child, runs
//! in `Drop`, so it covers every exit path of the relay loop.

use crate::{BridgeError, Result, ServerConfig};
use nix::errno::Errno;
use nix::libc;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::pty::openpty;
use nix::unistd;
use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket and PTY open, child alive
    Established,
    /// One endpoint signaled EOF or an error; teardown pending
    Closing,
    /// All descriptors released, child terminated
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Established => write!(f, "established"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One bridged connection
pub struct Session {
    stream: TcpStream,
    peer_addr: SocketAddr,
    master: OwnedFd,
    child: Child,
    state: SessionState,
    chunk_size: usize,
    poll_timeout: PollTimeout,
}

impl Session {
    /// Allocate a pseudo-terminal and spawn the configured shell on it
    ///
    /// The slave descriptor is handed to the child and closed in this
    /// process before `open` returns; from then on only the child owns it.
    /// A PTY allocation or spawn failure aborts this session only.
    pub fn open(stream: TcpStream, config: &ServerConfig) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let pty = openpty(None, None).map_err(BridgeError::PtyAllocation)?;
        let child = spawn_shell(config, pty.slave)?;

        debug!(peer = %peer_addr, pid = child.id(), "session established");

        let poll_timeout = match config.idle_timeout {
            Some(timeout) => {
                let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
                PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
            }
            None => PollTimeout::NONE,
        };

        Ok(Self {
            stream,
            peer_addr,
            master: pty.master,
            child,
            state: SessionState::Established,
            chunk_size: config.chunk_size,
            poll_timeout,
        })
    }

    /// The connected peer's address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process id of the shell child
    pub fn child_id(&self) -> u32 {
        self.child.id()
    }

    /// Run the relay loop until either endpoint closes or errors
    ///
    /// Consumes the session; dropping it afterwards releases the socket and
    /// PTY master and force-terminates the child.
    pub fn run(mut self) -> Result<()> {
        self.relay()
    }

    /// Readiness-multiplexing loop over the socket and the PTY master
    fn relay(&mut self) -> Result<()> {
        let mut buf = vec![0u8; self.chunk_size];
        let hangup = PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;

        loop {
            let (client_revents, master_revents) = {
                let mut fds = [
                    PollFd::new(self.stream.as_fd(), PollFlags::POLLIN),
                    PollFd::new(self.master.as_fd(), PollFlags::POLLIN),
                ];
                match poll(&mut fds, self.poll_timeout) {
                    Ok(0) => {
                        debug!(peer = %self.peer_addr, "session idle timeout");
                        self.state = SessionState::Closing;
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(errno) => {
                        self.state = SessionState::Closing;
                        return Err(BridgeError::Poll(errno));
                    }
                }
                (
                    fds[0].revents().unwrap_or(PollFlags::empty()),
                    fds[1].revents().unwrap_or(PollFlags::empty()),
                )
            };

            // Client to shell stdin
            if client_revents.contains(PollFlags::POLLIN) {
                let read = (&self.stream).read(&mut buf)?;
                if read == 0 {
                    debug!(peer = %self.peer_addr, "client closed connection");
                    self.state = SessionState::Closing;
                    return Ok(());
                }
                write_all_fd(self.master.as_fd(), &buf[..read])?;
            } else if client_revents.intersects(hangup) {
                self.state = SessionState::Closing;
                return Ok(());
            }

            // Shell stdout/stderr to client
            if master_revents.contains(PollFlags::POLLIN) {
                match unistd::read(self.master.as_fd(), &mut buf) {
                    // EIO means the child exited and released its side
                    Ok(0) | Err(Errno::EIO) => {
                        debug!(peer = %self.peer_addr, "shell closed terminal");
                        self.state = SessionState::Closing;
                        return Ok(());
                    }
                    Ok(read) => (&self.stream).write_all(&buf[..read])?,
                    Err(Errno::EINTR) => {}
                    Err(errno) => {
                        self.state = SessionState::Closing;
                        return Err(BridgeError::Sys(errno));
                    }
                }
            } else if master_revents.intersects(hangup) {
                self.state = SessionState::Closing;
                return Ok(());
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Unconditional teardown: no orphaned shell may survive a session,
        // whichever way the relay loop exited. SIGKILL, then reap.
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.state = SessionState::Closed;
        debug!(peer = %self.peer_addr, "session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state)
            .field("child", &self.child.id())
            .finish()
    }
}

/// Spawn the shell with stdin/stdout/stderr attached to the PTY slave
///
/// The child leads its own session with the slave as controlling terminal;
/// without that, job control inside the shell is broken.
fn spawn_shell(config: &ServerConfig, slave: OwnedFd) -> Result<Child> {
    let stdin = slave.try_clone()?;
    let stdout = slave.try_clone()?;

    let mut command = Command::new(&config.shell);
    command
        .args(&config.shell_args)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(slave));

    // SAFETY: only async-signal-safe calls between fork and exec.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() < 0 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    // The Stdio handles (and with them the slave) close in this process
    // when `command` goes out of scope; the child keeps its own copies.
    command.spawn().map_err(|source| BridgeError::SpawnFailed {
        command: config.shell.display().to_string(),
        source,
    })
}

/// Write the whole chunk to a descriptor, retrying partial writes
fn write_all_fd(fd: BorrowedFd<'_>, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match unistd::write(fd, buf) {
            Ok(0) => return Err(BridgeError::Sys(Errno::EIO)),
            Ok(written) => buf = &buf[written..],
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(BridgeError::Sys(errno)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// Accepted/connected socket pair on an ephemeral port
    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn test_open_with_invalid_shell_fails() {
        let (server, _client) = socket_pair();
        let config = ServerConfig::default().with_shell("/nonexistent/shell");

        let err = Session::open(server, &config).unwrap_err();
        assert!(err.is_resource_exhaustion());
    }

    #[test]
    fn test_open_spawns_live_child() {
        let (server, _client) = socket_pair();
        let config = ServerConfig::default().with_shell("/bin/sh");

        let session = Session::open(server, &config).unwrap();
        assert_eq!(session.state(), SessionState::Established);

        let pid = nix::unistd::Pid::from_raw(session.child_id() as i32);
        assert!(nix::sys::signal::kill(pid, None).is_ok());
    }

    #[test]
    fn test_drop_terminates_child() {
        let (server, _client) = socket_pair();
        let config = ServerConfig::default().with_shell("/bin/sh");

        let session = Session::open(server, &config).unwrap();
        let pid = nix::unistd::Pid::from_raw(session.child_id() as i32);
        drop(session);

        // Drop reaped the child; the pid is gone from the process table.
        assert!(nix::sys::signal::kill(pid, None).is_err());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Established.to_string(), "established");
        assert_eq!(SessionState::Closing.to_string(), "closing");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
