//! Listening socket construction and raw descriptor syscalls.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{BorrowedFd, RawFd};
use std::path::Path;

use socket2::{Domain, SockAddr, SockRef, Socket, Type};

use crate::net::FdGuard;
use crate::protocol::ServerError;

/// Size in bytes of the kernel send and receive buffers requested per
/// socket, and of the userspace read chunks.
///
/// The kernel rounds and bounds the buffer sizes it actually applies, so
/// this is a sizing hint, not a per-receive limit.
pub const SOCKET_BUFFER_SIZE: usize = 8192;

/// Builds a non-blocking TCP v4 listening socket bound to `ip:port`.
///
/// `SO_REUSEADDR` allows rebinding ports stuck in TIME_WAIT.
/// `SO_REUSEPORT` lets multiple server instances share one address, with
/// the kernel balancing new connections across them.
pub(crate) fn bind_tcp(ip: &str, port: u16) -> Result<FdGuard, ServerError> {
    let ip: Ipv4Addr = ip
        .parse()
        .map_err(|_| ServerError::invalid_address(format!("not a dotted-quad IPv4 address: {ip:?}")))?;

    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(|e| ServerError::io("create socket", e))?;
    socket.set_reuse_address(true).map_err(|e| ServerError::io("set socket options", e))?;
    socket.set_reuse_port(true).map_err(|e| ServerError::io("set socket options", e))?;
    socket
        .set_recv_buffer_size(SOCKET_BUFFER_SIZE)
        .map_err(|e| ServerError::io("set receive buffer size", e))?;
    socket
        .set_send_buffer_size(SOCKET_BUFFER_SIZE)
        .map_err(|e| ServerError::io("set send buffer size", e))?;
    socket
        .bind(&SockAddr::from(SocketAddrV4::new(ip, port)))
        .map_err(|e| ServerError::io("bind socket", e))?;
    socket.set_nonblocking(true).map_err(|e| ServerError::io("set socket non-blocking", e))?;

    Ok(FdGuard::from(socket))
}

/// Builds a non-blocking UNIX stream listening socket at `path`.
///
/// Parent directories are created as needed. A stale socket file is removed
/// first; removal failures are ignored and surface at bind if they matter.
pub(crate) fn bind_unix(path: &Path) -> Result<FdGuard, ServerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ServerError::io("create socket directory", e))?;
        }
    }
    let _ = std::fs::remove_file(path);

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(|e| ServerError::io("create socket", e))?;
    let addr = SockAddr::unix(path).map_err(|e| ServerError::invalid_address(e))?;
    socket.bind(&addr).map_err(|e| ServerError::io("bind socket", e))?;
    socket.set_nonblocking(true).map_err(|e| ServerError::io("set socket non-blocking", e))?;

    Ok(FdGuard::from(socket))
}

/// Starts listening on a bound socket.
pub(crate) fn listen(socket: &FdGuard, backlog: i32) -> io::Result<()> {
    if unsafe { libc::listen(socket.raw(), backlog) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Accepts one pending connection, returning its descriptor set non-blocking.
pub(crate) fn accept(socket: &FdGuard) -> io::Result<FdGuard> {
    let fd = unsafe { libc::accept(socket.raw(), std::ptr::null_mut(), std::ptr::null_mut()) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let guard = FdGuard::new(fd);
    set_nonblocking(fd)?;
    Ok(guard)
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Pending error on the socket, as reported by `SO_ERROR`.
pub(crate) fn take_socket_error(socket: &FdGuard) -> io::Error {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let res = unsafe {
        libc::getsockopt(
            socket.raw(),
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            (&mut err as *mut libc::c_int).cast(),
            &mut len,
        )
    };
    if res < 0 {
        io::Error::last_os_error()
    } else {
        io::Error::from_raw_os_error(err)
    }
}

/// Local address of a bound TCP socket.
pub(crate) fn local_addr(socket: &FdGuard) -> io::Result<SocketAddr> {
    let borrowed = unsafe { BorrowedFd::borrow_raw(socket.raw()) };
    let addr = SockRef::from(&borrowed).local_addr()?;
    addr.as_socket()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "not an inet socket"))
}
