//! An embeddable HTTP/1.1 server that multiplexes many TCP or UNIX-domain
//! client connections from a single thread, driven by readiness events.
//!
//! The serving thread owns a listening socket, a readiness poll and one
//! state record per connection. Each connection advances through request
//! parsing, handler execution and response emission without ever blocking
//! the loop: the request parser resumes on partial byte arrivals, and
//! handlers awaiting body bytes suspend cooperatively until the kernel has
//! more to give.
//!
//! Handlers are registered per path and method before serving:
//!
//! ```no_run
//! use solo_http::{handler_fn, Server};
//!
//! fn main() -> Result<(), solo_http::ServerError> {
//!     let mut server = Server::bind_tcp("127.0.0.1", 8080)?;
//!     server.register("/ping", "GET", handler_fn(|_req, mut resp, _body| async move {
//!         resp.set_content_type("text/plain").set_body("pong");
//!         Ok(resp)
//!     }));
//!     server.serve()
//! }
//! ```
//!
//! Horizontal scaling is achieved by running several independent instances
//! bound to the same TCP address: `SO_REUSEPORT` makes the kernel balance
//! new connections across them.

pub mod codec;
mod connection;
pub mod handler;
pub mod net;
pub mod protocol;
pub mod server;

pub use crate::handler::{handler_fn, BoxError, Handler, HandlerFuture};
pub use crate::protocol::body::BodyReader;
pub use crate::protocol::{ParseError, Request, Response, ServerError};
pub use crate::server::Server;

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
