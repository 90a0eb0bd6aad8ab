//! Streaming access to the request body.

use std::future::poll_fn;
use std::io;
use std::rc::Rc;
use std::task::Poll;

use bytes::{Bytes, BytesMut};

use crate::net::FdGuard;

/// Cooperative reader over the connection socket, handed to handlers for
/// consuming the request body.
///
/// [`read`](Self::read) is the single point where a handler may suspend:
/// when the kernel has no more bytes, the returned future parks until the
/// serve loop sees the connection readable again and re-polls the handler.
/// Handler code stays straight-line even for bodies spread over many TCP
/// segments.
pub struct BodyReader {
    socket: Rc<FdGuard>,
    buffer_size: usize,
    remaining: usize,
    cache: BytesMut,
}

impl BodyReader {
    /// `preread` holds body bytes that arrived in the same segments as the
    /// header block; anything beyond the declared content length is not
    /// part of this body and is left behind.
    pub(crate) fn new(socket: Rc<FdGuard>, buffer_size: usize, content_length: usize, preread: &[u8]) -> Self {
        let seed = &preread[..preread.len().min(content_length)];
        Self {
            socket,
            buffer_size,
            remaining: content_length,
            cache: BytesMut::from(seed),
        }
    }

    /// Body bytes not yet returned by [`read`](Self::read).
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Reads up to `size` bytes of the body.
    ///
    /// The request is clamped to the remaining body size, and once the body
    /// is exhausted an empty chunk is returned immediately. Each attempt
    /// receives a full socket buffer's worth into an internal cache, which
    /// avoids underfetching when callers ask for a few bytes at a time.
    ///
    /// An error terminates the handler; the loop then closes the connection.
    pub async fn read(&mut self, size: usize) -> io::Result<Bytes> {
        let size = size.min(self.remaining);
        poll_fn(|_cx| {
            if self.remaining == 0 {
                return Poll::Ready(Ok(Bytes::new()));
            }
            loop {
                if self.cache.len() >= size {
                    let chunk = self.cache.split_to(size).freeze();
                    self.remaining -= size;
                    return Poll::Ready(Ok(chunk));
                }

                let mut buffer = vec![0u8; self.buffer_size];
                match self.socket.recv(&mut buffer) {
                    Ok(0) => {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "peer closed the connection mid-body",
                        )))
                    }
                    Ok(n) => self.cache.extend_from_slice(&buffer[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
                    Err(e) => return Poll::Ready(Err(e)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;
    use std::future::Future;
    use std::io::Write;
    use std::os::fd::IntoRawFd;
    use std::os::unix::net::UnixStream;
    use std::pin::pin;
    use std::task::Context;

    fn reader(content_length: usize, preread: &[u8]) -> (BodyReader, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        let socket = Rc::new(FdGuard::new(ours.into_raw_fd()));
        (BodyReader::new(socket, 64, content_length, preread), theirs)
    }

    #[test]
    fn serves_preread_bytes_without_touching_the_socket() {
        let (mut body, _peer) = reader(10, b"hel");
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut fut = pin!(body.read(3));
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(chunk)) => assert_eq!(&chunk[..], b"hel"),
            other => panic!("expected a ready chunk, got {other:?}"),
        }
    }

    #[test]
    fn suspends_and_resumes_when_bytes_arrive() {
        let (mut body, mut peer) = reader(10, b"hel");
        let mut cx = Context::from_waker(noop_waker_ref());

        {
            let mut fut = pin!(body.read(3));
            assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(_))));
        }

        let mut fut = pin!(body.read(4));
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        peer.write_all(b"lo world").unwrap();
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(chunk)) => assert_eq!(&chunk[..], b"lo w"),
            other => panic!("expected a ready chunk, got {other:?}"),
        }
    }

    #[test]
    fn clamps_to_the_remaining_body_and_then_returns_empty() {
        let (mut body, mut peer) = reader(10, b"hel");
        peer.write_all(b"lo world").unwrap();
        let mut cx = Context::from_waker(noop_waker_ref());

        {
            let mut fut = pin!(body.read(100));
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(Ok(chunk)) => assert_eq!(&chunk[..], b"hello worl"),
                other => panic!("expected the whole body, got {other:?}"),
            }
        }
        assert_eq!(body.remaining(), 0);

        // reading beyond the body is an immediate empty chunk
        let mut fut = pin!(body.read(5));
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(chunk)) => assert!(chunk.is_empty()),
            other => panic!("expected an empty chunk, got {other:?}"),
        }
    }

    #[test]
    fn preread_is_clamped_to_the_content_length() {
        let (mut body, _peer) = reader(4, b"ping-and-pipelined-junk");
        let mut cx = Context::from_waker(noop_waker_ref());

        {
            let mut fut = pin!(body.read(100));
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(Ok(chunk)) => assert_eq!(&chunk[..], b"ping"),
                other => panic!("expected the clamped body, got {other:?}"),
            }
        }
        assert_eq!(body.remaining(), 0);
    }

    #[test]
    fn peer_hangup_mid_body_is_an_error() {
        let (mut body, peer) = reader(10, b"");
        drop(peer);
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut fut = pin!(body.read(10));
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Err(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected an error, got {other:?}"),
        }
    }
}
