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

//! TCP listener for the accept loop
//!
//! A thin wrapper over the raw listening socket. Built with `nix` rather
//! than `std::net::TcpListener` so the listen backlog is configurable and
//! the accept wait can be a readiness poll with a timeout, which keeps the
//! accept loop responsive to `stop()` without a forced wake mechanism.

use crate::{BridgeError, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{
    AddressFamily, Backlog, SockFlag, SockType, SockaddrStorage, accept4, bind, getsockname,
    listen, setsockopt, socket, sockopt,
};
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6, TcpStream};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

/// The listening endpoint, owned solely by the accept thread
pub(crate) struct BridgeListener {
    fd: OwnedFd,
    local_addr: SocketAddr,
}

impl BridgeListener {
    /// Bind and listen on the given address with the given backlog
    ///
    /// Sets `SO_REUSEADDR` so a restarted server can rebind immediately.
    pub(crate) fn bind(addr: SocketAddr, backlog: usize) -> Result<Self> {
        let family = if addr.is_ipv4() {
            AddressFamily::Inet
        } else {
            AddressFamily::Inet6
        };

        let fd = socket(family, SockType::Stream, SockFlag::SOCK_CLOEXEC, None)?;
        setsockopt(&fd, sockopt::ReuseAddr, &true)?;

        let sockaddr = SockaddrStorage::from(addr);
        bind(fd.as_raw_fd(), &sockaddr)?;
        listen(&fd, Backlog::new(backlog as i32)?)?;

        // Re-read the bound address; with port 0 the OS picked one.
        let local_addr = local_addr_of(&fd)?;

        Ok(Self { fd, local_addr })
    }

    /// The address the listener is actually bound to
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `timeout` for an incoming connection and accept it
    ///
    /// Returns `Ok(None)` when the wait times out or is interrupted, so the
    /// caller can re-check its running flag and come back.
    pub(crate) fn poll_accept(&self, timeout: Duration) -> Result<Option<TcpStream>> {
        let timeout = PollTimeout::from(timeout.as_millis().min(u16::MAX as u128) as u16);
        let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, timeout) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(None),
            Err(errno) => return Err(BridgeError::Poll(errno)),
        }

        let raw = accept4(self.fd.as_raw_fd(), SockFlag::SOCK_CLOEXEC)?;
        // SAFETY: accept4 returned a freshly created, owned descriptor.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Some(TcpStream::from(owned)))
    }
}

impl std::fmt::Debug for BridgeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeListener")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn local_addr_of(fd: &OwnedFd) -> Result<SocketAddr> {
    let sockaddr = getsockname::<SockaddrStorage>(fd.as_raw_fd())?;
    if let Some(sin) = sockaddr.as_sockaddr_in() {
        Ok(SocketAddr::V4(SocketAddrV4::new(sin.ip(), sin.port())))
    } else if let Some(sin6) = sockaddr.as_sockaddr_in6() {
        Ok(SocketAddr::V6(SocketAddrV6::new(
            sin6.ip(),
            sin6.port(),
            sin6.flowinfo(),
            sin6.scope_id(),
        )))
    } else {
        Err(BridgeError::Sys(Errno::EAFNOSUPPORT))
    }
}
