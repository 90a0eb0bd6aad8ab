//! Owned file descriptor handle.

use std::io;
use std::os::fd::{IntoRawFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

/// Sentinel for a closed or never-opened descriptor.
pub const INVALID_FD: RawFd = -1;

/// Owning wrapper around one OS file descriptor.
///
/// The descriptor is closed exactly once, by [`close`](Self::close) or on
/// drop, whichever comes first. `close` may be called from a thread other
/// than the one driving I/O — the descriptor number is an atomic and the
/// close itself is serialized by a mutex — which is what lets
/// [`Server::kill`](crate::Server::kill) shut a serving loop down from
/// outside. Reads of the descriptor number are lock-free.
#[derive(Debug)]
pub struct FdGuard {
    fd: AtomicI32,
    close_lock: Mutex<()>,
}

impl FdGuard {
    pub fn new(fd: RawFd) -> Self {
        Self { fd: AtomicI32::new(fd), close_lock: Mutex::new(()) }
    }

    /// Current descriptor number, [`INVALID_FD`] once closed.
    pub fn raw(&self) -> RawFd {
        self.fd.load(Ordering::Acquire)
    }

    pub fn is_valid(&self) -> bool {
        self.raw() != INVALID_FD
    }

    /// Closes the descriptor and invalidates the handle.
    ///
    /// Safe to call from any thread and any number of times; only the first
    /// call reaches the kernel.
    pub fn close(&self) {
        let _guard = self.close_lock.lock().unwrap();
        let fd = self.fd.swap(INVALID_FD, Ordering::AcqRel);
        if fd != INVALID_FD {
            unsafe { libc::close(fd) };
        }
    }

    /// One receive from the socket into `buf`.
    ///
    /// `WouldBlock` passes through untouched for the caller to act on.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::recv(self.raw(), buf.as_mut_ptr().cast(), buf.len(), 0) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    /// One send of `buf` to the socket.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        // EPIPE instead of SIGPIPE when the peer is gone
        let n = unsafe { libc::send(self.raw(), buf.as_ptr().cast(), buf.len(), libc::MSG_NOSIGNAL) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Equality is on descriptor numbers.
impl PartialEq for FdGuard {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl From<socket2::Socket> for FdGuard {
    fn from(socket: socket2::Socket) -> Self {
        Self::new(socket.into_raw_fd())
    }
}
