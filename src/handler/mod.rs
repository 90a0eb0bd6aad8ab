//! Handler registration surface.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use crate::protocol::body::BodyReader;
use crate::protocol::{Request, Response};

/// Error type handlers may bubble up.
///
/// The serve loop answers it by closing the connection without sending any
/// further response bytes.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Future produced by a handler.
///
/// Deliberately not `Send`: handlers run inside the single-threaded serve
/// loop and never migrate.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, BoxError>>>>;

/// A registered request handler.
///
/// `call` receives the parsed request, the response to populate (already
/// defaulted to `200 OK`), and the reader for the request body. The
/// returned future resolves to the finished response and may suspend only
/// inside [`BodyReader::read`].
pub trait Handler: Send + Sync {
    fn call(&self, request: Request, response: Response, body: BodyReader) -> HandlerFuture;
}

/// [`Handler`] adapter for async functions and closures.
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request, Response, BodyReader) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + 'static,
{
    fn call(&self, request: Request, response: Response, body: BodyReader) -> HandlerFuture {
        Box::pin((self.f)(request, response, body))
    }
}

/// Wraps an async function into a [`Handler`].
///
/// ```no_run
/// # use solo_http::{handler_fn, Server};
/// # let mut server = Server::bind_tcp("127.0.0.1", 0).unwrap();
/// server.register("/up", "POST", handler_fn(|_req, mut resp, mut body| async move {
///     let chunk = body.read(4096).await?;
///     resp.set_body(format!("got {} bytes", chunk.len()));
///     Ok(resp)
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request, Response, BodyReader) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + 'static,
{
    HandlerFn { f }
}
