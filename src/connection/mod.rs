//! Per-connection state.

use std::fmt;
use std::rc::Rc;

use crate::codec::Buffer;
use crate::handler::HandlerFuture;
use crate::net::FdGuard;
use crate::protocol::{Request, Response};

/// Discrete stage of a connection's request/response cycle.
pub(crate) enum Stage {
    /// Reading and parsing the request header block.
    Request,
    /// The handler is running. Its suspended future lives here and is
    /// re-polled on readable readiness until it completes.
    Handler(HandlerFuture),
    /// Draining the serialized response to the socket.
    Response,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Request => f.write_str("Request"),
            Stage::Handler(_) => f.write_str("Handler(..)"),
            Stage::Response => f.write_str("Response"),
        }
    }
}

/// Everything the serve loop tracks for one accepted connection.
///
/// The descriptor is shared with the body reader while a handler runs; the
/// loop keeps its own reference so the descriptor outlives either side.
pub(crate) struct Connection {
    pub(crate) socket: Rc<FdGuard>,
    pub(crate) stage: Stage,
    pub(crate) req_buffer: Buffer,
    pub(crate) res_buffer: Buffer,
    pub(crate) request: Request,
    pub(crate) response: Response,
    /// Close instead of resetting once the response is drained. Set on
    /// parse failures, where request framing is lost.
    pub(crate) close_after: bool,
}

impl Connection {
    pub(crate) fn new(socket: FdGuard) -> Self {
        Self {
            socket: Rc::new(socket),
            stage: Stage::Request,
            req_buffer: Buffer::new(),
            res_buffer: Buffer::new(),
            request: Request::new(),
            response: Response::new(),
            close_after: false,
        }
    }

    /// Returns the connection to the request stage for the next keep-alive
    /// exchange, preserving only the descriptor.
    pub(crate) fn reset(&mut self) {
        self.stage = Stage::Request;
        self.req_buffer = Buffer::new();
        self.res_buffer = Buffer::new();
        self.request = Request::new();
        self.response = Response::new();
        self.close_after = false;
    }
}
