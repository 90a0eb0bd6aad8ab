//! Server facade: construction, route registration, serving and shutdown.

mod event_loop;

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;

use mio::Waker;
use tracing::info;

use crate::handler::Handler;
use crate::net::{self, FdGuard};
use crate::protocol::ServerError;

/// Connection backlog handed to `listen`.
pub const LISTEN_BACKLOG: i32 = 128;

/// Upper bound on readiness events handled in one loop iteration.
pub const MAX_EVENTS_PER_LOOP: usize = 12;

pub(crate) type RouteTable = HashMap<String, HashMap<String, Box<dyn Handler>>>;

/// An HTTP/1.1 server bound to one listening socket.
///
/// All connections are multiplexed on the single thread that calls
/// [`serve`](Self::serve); idle connections cost one descriptor and one
/// state record each. Horizontal scaling comes from running more instances
/// bound to the same TCP address — `SO_REUSEPORT` makes the kernel balance
/// new connections across them.
///
/// Routes must be registered before serving:
///
/// ```no_run
/// use solo_http::{handler_fn, Server};
///
/// # fn main() -> Result<(), solo_http::ServerError> {
/// let mut server = Server::bind_tcp("127.0.0.1", 8080)?;
/// server.register("/ping", "GET", handler_fn(|_req, mut resp, _body| async move {
///     resp.set_content_type("text/plain").set_body("pong");
///     Ok(resp)
/// }));
/// server.serve()
/// # }
/// ```
pub struct Server {
    listener: FdGuard,
    routes: RouteTable,
    waker: OnceLock<Waker>,
}

impl Server {
    /// Binds a TCP v4 listening socket on `ip:port`.
    ///
    /// `ip` must be a dotted-quad IPv4 literal; anything else fails with
    /// [`ServerError::InvalidAddress`]. The socket gets `SO_REUSEADDR` and
    /// `SO_REUSEPORT`, 8 KiB send and receive buffers, and is set
    /// non-blocking.
    pub fn bind_tcp(ip: &str, port: u16) -> Result<Self, ServerError> {
        let listener = net::bind_tcp(ip, port)?;
        Ok(Self::with_listener(listener))
    }

    /// Binds a UNIX stream listening socket at `path`.
    ///
    /// Missing parent directories are created and a stale socket file is
    /// removed first.
    pub fn bind_unix(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let listener = net::bind_unix(path.as_ref())?;
        Ok(Self::with_listener(listener))
    }

    fn with_listener(listener: FdGuard) -> Self {
        Self { listener, routes: HashMap::new(), waker: OnceLock::new() }
    }

    /// Registers `handler` for requests matching `path` and `method`
    /// exactly. Must be called before [`serve`](Self::serve); the route
    /// table is not touched while serving.
    pub fn register(&mut self, path: impl Into<String>, method: impl Into<String>, handler: impl Handler + 'static) {
        self.routes.entry(path.into()).or_default().insert(method.into(), Box::new(handler));
    }

    /// Local address of the listening socket. TCP only; handy after
    /// binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        net::local_addr(&self.listener)
    }

    /// Serves until killed or until a fatal error occurs.
    ///
    /// Blocks the calling thread: starts the listener with a backlog of
    /// [`LISTEN_BACKLOG`], creates the readiness poll and runs the event
    /// loop. Returns `Ok(())` after [`kill`](Self::kill); per-connection
    /// failures never surface here. In-flight connections are dropped and
    /// their descriptors closed on return.
    pub fn serve(&self) -> Result<(), ServerError> {
        event_loop::run(&self.listener, &self.routes, &self.waker)
    }

    /// Requests shutdown. Safe to call from any thread, any number of
    /// times.
    ///
    /// Closes the listening descriptor — new connections are refused
    /// immediately — and wakes the serve loop, which returns within one
    /// iteration, dropping its in-flight connections.
    pub fn kill(&self) {
        info!("kill requested");
        self.listener.close();
        if let Some(waker) = self.waker.get() {
            let _ = waker.wake();
        }
    }
}
