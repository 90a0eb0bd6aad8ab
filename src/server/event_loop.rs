//! The readiness-driven serve loop.
//!
//! One thread owns the listening descriptor, the poll instance, the
//! connection map and every per-connection state for the duration of
//! [`serve`](crate::Server::serve). Connections are keyed by descriptor
//! number; each is registered for both readable and writable readiness and
//! dispatched according to its stage: the request stage acts on readable
//! events, the response stage on writable events, and a suspended handler
//! is re-polled on readable events.
//!
//! The poll registrations are edge-triggered, so every stage transition
//! immediately attempts its I/O and falls back to waiting only after the
//! kernel reports `WouldBlock`.

use std::collections::HashMap;
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::OnceLock;
use std::task::{Context, Poll as TaskPoll};
use std::time::SystemTime;

use futures::task::noop_waker_ref;
use http::StatusCode;
use mio::event::Event;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{DecodeState, RequestDecoder, ResponseEncoder};
use crate::connection::{Connection, Stage};
use crate::net::{self, FdGuard, SOCKET_BUFFER_SIZE};
use crate::protocol::body::BodyReader;
use crate::protocol::{Response, ServerError};
use crate::server::{RouteTable, LISTEN_BACKLOG, MAX_EVENTS_PER_LOOP};

/// Token for the kill-side waker; descriptor numbers never reach it, and
/// `Token(usize::MAX)` itself is reserved by the poll implementation.
const SHUTDOWN: Token = Token(usize::MAX - 1);

/// Whether a connection survives its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Keep,
    Close,
}

pub(crate) fn run(listener: &FdGuard, routes: &RouteTable, waker_slot: &OnceLock<Waker>) -> Result<(), ServerError> {
    net::listen(listener, LISTEN_BACKLOG).map_err(|e| ServerError::io("start listener", e))?;

    let poll = Poll::new().map_err(|e| ServerError::io("create readiness poll", e))?;
    let waker = Waker::new(poll.registry(), SHUTDOWN).map_err(|e| ServerError::io("create shutdown waker", e))?;
    if waker_slot.set(waker).is_err() {
        trace!("shutdown waker already installed by an earlier serve");
    }

    let listener_fd = listener.raw();
    poll.registry()
        .register(&mut SourceFd(&listener_fd), Token(listener_fd as usize), Interest::READABLE)
        .map_err(|e| ServerError::io("register listener", e))?;

    info!(fd = listener_fd, "serving");
    let mut event_loop = EventLoop {
        listener,
        routes,
        poll,
        decoder: RequestDecoder::new(),
        encoder: ResponseEncoder::new(),
        connections: HashMap::new(),
    };
    event_loop.run(listener_fd)
}

struct EventLoop<'srv> {
    listener: &'srv FdGuard,
    routes: &'srv RouteTable,
    poll: Poll,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
    connections: HashMap<RawFd, Connection>,
}

impl<'srv> EventLoop<'srv> {
    fn run(&mut self, listener_fd: RawFd) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(MAX_EVENTS_PER_LOOP);
        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::io("wait for readiness events", e));
            }

            for event in events.iter() {
                match event.token() {
                    SHUTDOWN => {
                        info!("listening socket closed, leaving serve loop");
                        return Ok(());
                    }
                    Token(t) if t == listener_fd as usize => {
                        if self.on_listener_event(event)? {
                            return Ok(());
                        }
                    }
                    Token(t) => self.on_connection_event(t as RawFd, event),
                }
            }
        }
    }

    /// Returns `true` when the loop should stop without error.
    fn on_listener_event(&mut self, event: &Event) -> Result<bool, ServerError> {
        if event.is_error() {
            let err = net::take_socket_error(self.listener);
            return Err(ServerError::io("listening socket", err));
        }
        if event.is_read_closed() {
            info!("listening socket hung up, leaving serve loop");
            return Ok(true);
        }
        self.accept_pending();
        Ok(false)
    }

    /// Accepts until the backlog is drained; an edge-triggered event fires
    /// once no matter how many connections are queued behind it.
    fn accept_pending(&mut self) {
        loop {
            match net::accept(self.listener) {
                Ok(socket) => {
                    let fd = socket.raw();
                    let registered = self.poll.registry().register(
                        &mut SourceFd(&fd),
                        Token(fd as usize),
                        Interest::READABLE | Interest::WRITABLE,
                    );
                    if let Err(e) = registered {
                        warn!(fd, "failed to register connection: {e}");
                        continue;
                    }
                    trace!(fd, "accepted connection");
                    self.connections.insert(fd, Connection::new(socket));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    // transient failure, the listener event will fire again
                    debug!("accept failed: {e}");
                    return;
                }
            }
        }
    }

    fn on_connection_event(&mut self, fd: RawFd, event: &Event) {
        let Some(mut conn) = self.connections.remove(&fd) else {
            // unmanaged descriptor, stop watching it
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
            return;
        };

        let hangup = event.is_read_closed() && event.is_write_closed();
        if event.is_error() || hangup {
            debug!(fd, "connection error or hangup");
            return;
        }

        let flow = if matches!(conn.stage, Stage::Request) && event.is_readable() {
            self.process_request(&mut conn)
        } else if matches!(conn.stage, Stage::Handler(_)) && event.is_readable() {
            self.drive_handler(&mut conn)
        } else if matches!(conn.stage, Stage::Response) && event.is_writable() {
            self.process_response(&mut conn)
        } else {
            Flow::Keep
        };

        match flow {
            Flow::Keep => {
                self.connections.insert(fd, conn);
            }
            Flow::Close => debug!(fd, "closing connection"),
        }
    }

    /// Receives into the parse buffer and advances the parser until the
    /// request is complete or the kernel runs dry.
    fn process_request(&mut self, conn: &mut Connection) -> Flow {
        loop {
            let mut chunk = [0u8; SOCKET_BUFFER_SIZE];
            let received = match conn.socket.recv(&mut chunk) {
                Ok(0) => {
                    debug!(fd = conn.socket.raw(), "peer closed while reading request");
                    return Flow::Close;
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Flow::Keep,
                Err(e) => {
                    debug!(fd = conn.socket.raw(), "receive failed: {e}");
                    return Flow::Close;
                }
            };
            conn.req_buffer.append(&chunk[..received]);

            match self.decoder.decode(&mut conn.req_buffer, &mut conn.request) {
                Ok(DecodeState::Partial) => continue,
                Ok(DecodeState::Complete) => return self.process_function(conn),
                Err(e) => {
                    warn!(fd = conn.socket.raw(), "rejecting request: {e}");
                    synthesize(&mut conn.response, StatusCode::BAD_REQUEST, e.to_string());
                    // request framing is lost, this connection cannot be reused
                    conn.close_after = true;
                    return self.enter_response(conn);
                }
            }
        }
    }

    /// Routes the completed request and starts its handler.
    fn process_function(&mut self, conn: &mut Connection) -> Flow {
        let routes = self.routes;

        let Some(methods) = routes.get(conn.request.path()) else {
            debug!(path = conn.request.path(), "no route");
            let text = format!("The requested resource {} was not found on this server", conn.request.path());
            synthesize(&mut conn.response, StatusCode::NOT_FOUND, text);
            return self.enter_response(conn);
        };
        let Some(handler) = methods.get(conn.request.method()) else {
            debug!(path = conn.request.path(), method = conn.request.method(), "method not registered");
            let text = format!("The method {} is not allowed for the requested resource", conn.request.method());
            synthesize(&mut conn.response, StatusCode::METHOD_NOT_ALLOWED, text);
            return self.enter_response(conn);
        };

        let content_length = conn.request.content_length().unwrap_or(0);
        let body = BodyReader::new(
            Rc::clone(&conn.socket),
            SOCKET_BUFFER_SIZE,
            content_length,
            conn.req_buffer.bytes_after_cursor(),
        );
        let response = mem::take(&mut conn.response);
        conn.stage = Stage::Handler(handler.call(conn.request.clone(), response, body));
        self.drive_handler(conn)
    }

    /// Polls the stored handler future one step.
    fn drive_handler(&mut self, conn: &mut Connection) -> Flow {
        let Stage::Handler(future) = &mut conn.stage else {
            return Flow::Keep;
        };
        let mut cx = Context::from_waker(noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            TaskPoll::Ready(Ok(response)) => {
                conn.response = response;
                self.enter_response(conn)
            }
            TaskPoll::Ready(Err(e)) => {
                error!(fd = conn.socket.raw(), "handler failed: {e}");
                Flow::Close
            }
            TaskPoll::Pending => Flow::Keep,
        }
    }

    /// Stamps the date, serializes the response and attempts the send right
    /// away; the writable event for this socket may already have fired.
    fn enter_response(&mut self, conn: &mut Connection) -> Flow {
        conn.response.set_date(SystemTime::now());
        self.encoder.encode(&conn.response, &mut conn.res_buffer);
        conn.stage = Stage::Response;
        self.process_response(conn)
    }

    /// Sends as much of the outbound buffer as the kernel accepts.
    fn process_response(&mut self, conn: &mut Connection) -> Flow {
        while conn.res_buffer.size_after_cursor() > 0 {
            match conn.socket.send(conn.res_buffer.bytes_after_cursor()) {
                Ok(sent) => {
                    conn.res_buffer.increment(sent);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Flow::Keep,
                Err(e) => {
                    debug!(fd = conn.socket.raw(), "send failed: {e}");
                    return Flow::Close;
                }
            }
        }

        if conn.close_after || !conn.request.keep_alive() {
            return Flow::Close;
        }

        trace!(fd = conn.socket.raw(), "response complete, keeping the connection");
        conn.reset();
        // bytes for the next request may have arrived while we were sending
        self.process_request(conn)
    }
}

fn synthesize(response: &mut Response, status: StatusCode, body: String) {
    response.set_status(status).set_content_type("text/plain").set_body(body);
}
