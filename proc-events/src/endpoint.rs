// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The raw transport: a kernel-control/connector datagram socket.
//!
//! This is a blocking, synchronous interface by design (SPEC_FULL.md
//! §4.1) — concurrency is supplied by [`crate::listener::Listener`],
//! not by this module. The one piece of genuine concurrency this
//! module must support is Close-during-recv (SPEC_FULL.md §5): the
//! controller thread closes the descriptor while the listener thread
//! may be blocked inside `recvfrom(2)` on the same fd. That rules out
//! the teacher's `PlatformHandle<T>`'s plain `Arc<OwnedFd>` (closing
//! requires unwrapping sole ownership, which the blocked reader
//! thread holds a reference into); this wraps the fd in an
//! `Arc<AtomicI32>` instead, so `close()` can swap in a sentinel and
//! call `close(2)` without needing `&mut self` or unique ownership.

use std::io;
use std::mem;
use std::os::unix::prelude::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::error::TransportError;

const CLOSED_FD: RawFd = -1;

/// Owns (possibly shared with a listener thread) the kernel connector
/// socket file descriptor.
#[derive(Clone)]
pub struct Endpoint {
    fd: Arc<AtomicI32>,
}

/// A bound address on the connector socket family: a unicast port id
/// (by convention the owning process id) and a multicast group mask.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorAddr {
    /// Unicast port id. The calling process's pid for the local bind.
    pub pid: u32,
    /// Multicast group bitmask to join. `CN_IDX_PROC`'s bit for the
    /// process-events group.
    pub groups: u32,
}

impl Endpoint {
    /// Creates a datagram socket in the kernel-control family using
    /// the connector protocol.
    ///
    /// `nix::sys::socket::SockProtocol` does not enumerate
    /// `NETLINK_CONNECTOR` (protocol 11), so this goes directly
    /// through `libc::socket`.
    pub fn open() -> Result<Self, TransportError> {
        // Safety: a plain socket(2) syscall with constant arguments.
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                libc::NETLINK_CONNECTOR,
            )
        };
        if fd < 0 {
            return Err(TransportError::SocketCreate(io::Error::last_os_error()));
        }
        Ok(Self {
            fd: Arc::new(AtomicI32::new(fd)),
        })
    }

    /// Binds to `addr`: unicast port id = the caller's pid, multicast
    /// group = the process-events group.
    pub fn bind(&self, addr: ConnectorAddr) -> Result<(), TransportError> {
        let fd = self.raw_fd()?;
        let sockaddr = make_sockaddr_nl(addr.pid, addr.groups);
        // Safety: `sockaddr` is a fully-initialized sockaddr_nl of the
        // size passed, and `fd` was validated open above.
        let rc = unsafe {
            libc::bind(
                fd,
                &sockaddr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::Bind(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Sends one datagram to the kernel unicast address (port id 0,
    /// group 0) — the kernel itself, not another userspace client.
    pub fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let fd = self.raw_fd()?;
        let dest = make_sockaddr_nl(0, 0);
        // Safety: `dest` is a valid sockaddr_nl, `bytes` is a valid
        // slice for its own length, and `fd` was validated open above.
        let rc = unsafe {
            libc::sendto(
                fd,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
                0,
                &dest as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::Send(io::Error::last_os_error()));
        }
        let written = rc as usize;
        if written != bytes.len() {
            return Err(TransportError::PartialSend {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    /// Blocks until one datagram arrives, returning the byte count
    /// read into `buffer`.
    ///
    /// `buffer` should be at least `L_max` (a page is sufficient, see
    /// [`crate::config::ClientConfig`]); a short read that cannot hold
    /// a full header stack is reported upstream by the codec, not here
    /// (this call only reports transport-level failure).
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let fd = self.raw_fd()?;
        // Safety: `buffer` is a valid mutable slice for its own length
        // and `fd` was validated open above. `fd` may be closed by
        // another thread mid-call (see module docs) — the syscall then
        // returns an error, which we surface as `TransportError::Recv`.
        let rc = unsafe {
            libc::recvfrom(
                fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(TransportError::Recv(io::Error::last_os_error()));
        }
        Ok(rc as usize)
    }

    /// Closes the descriptor. Idempotent. Safe to call while another
    /// thread is blocked inside [`Endpoint::recv`] on the same
    /// `Endpoint` (that call will then fail and return a
    /// `TransportError`).
    pub fn close(&self) {
        let old = self.fd.swap(CLOSED_FD, Ordering::SeqCst);
        if old != CLOSED_FD {
            // Safety: `old` was a valid fd owned solely by this
            // Endpoint's shared state, now exchanged out, so no other
            // caller through this Endpoint will observe or close it again.
            unsafe {
                libc::close(old);
            }
        }
    }

    fn raw_fd(&self) -> Result<RawFd, TransportError> {
        match self.fd.load(Ordering::SeqCst) {
            CLOSED_FD => Err(TransportError::Closed),
            fd => Ok(fd),
        }
    }
}

fn make_sockaddr_nl(pid: u32, groups: u32) -> libc::sockaddr_nl {
    let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr.nl_pid = pid;
    addr.nl_groups = groups;
    addr
}
