//! Descriptor ownership and socket plumbing.

mod fd;
mod socket;

pub use fd::{FdGuard, INVALID_FD};
pub use socket::SOCKET_BUFFER_SIZE;

pub(crate) use socket::{accept, bind_tcp, bind_unix, listen, local_addr, take_socket_error};
