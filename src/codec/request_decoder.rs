//! Incremental HTTP/1.1 request parser.
//!
//! The decoder consumes a [`Buffer`] in place and fills a [`Request`] in
//! place. It may be called again whenever new bytes have been appended:
//! every completed token commits the buffer cursor, and running out of
//! bytes mid-token rolls the cursor back to the last commit so the next
//! call retries from there. Which tokens are still missing is tracked by
//! the request itself — an empty field means "not parsed yet" — so the
//! decoder carries no state of its own.

use crate::codec::Buffer;
use crate::ensure;
use crate::protocol::{ParseError, Request};

/// Maximum size of the request line plus header block in bytes.
pub const MAX_HEADER_SIZE: usize = 8192;

/// Outcome of a decode call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// The header block is complete. Any bytes left after the buffer cursor
    /// belong to the body.
    Complete,
    /// More bytes are needed; the cursor was rolled back to the last commit.
    Partial,
}

#[derive(Debug, Default)]
pub struct RequestDecoder;

impl RequestDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Advances the request by whatever the buffer currently holds.
    ///
    /// A [`ParseError`] is fatal for the connection; the caller answers it
    /// with a 400 carrying the error text.
    pub fn decode(&mut self, src: &mut Buffer, request: &mut Request) -> Result<DecodeState, ParseError> {
        let state = parse(src, request)?;

        // The size cap counts committed header bytes. While the header block
        // is still incomplete everything buffered so far is header bytes,
        // and raw length is the only measure that bounds a single oversized
        // token, which never commits.
        let header_size = match state {
            DecodeState::Complete => src.size_before_cursor(),
            DecodeState::Partial => src.len(),
        };
        ensure!(header_size <= MAX_HEADER_SIZE, ParseError::header_too_large(header_size, MAX_HEADER_SIZE));

        Ok(state)
    }
}

fn parse(src: &mut Buffer, request: &mut Request) -> Result<DecodeState, ParseError> {
    if request.method().is_empty() {
        match read_until_space(src) {
            Some(token) => {
                request.set_method(token);
                src.commit();
            }
            None => return partial(src),
        }
    }

    if request.path().is_empty() {
        match read_until_space(src) {
            Some(token) => {
                request.set_path(token);
                src.commit();
            }
            None => return partial(src),
        }
    }

    if request.version().is_empty() {
        match read_line(src) {
            Some(token) => {
                request.set_version(token);
                src.commit();
            }
            None => return partial(src),
        }
    }

    loop {
        let mut key = Vec::new();
        // Key bytes, up to the colon. A newline here ends the header block;
        // on the first byte that is the regular blank line.
        loop {
            match src.next() {
                None => return partial(src),
                Some(b'\r') => continue,
                Some(b'\n') => {
                    src.commit();
                    return Ok(DecodeState::Complete);
                }
                Some(b':') => break,
                Some(byte) => key.push(byte),
            }
        }

        match src.next() {
            None => return partial(src),
            Some(b' ') => {}
            Some(found) => return Err(ParseError::missing_header_space(src.size_before_cursor(), found)),
        }

        let mut value = Vec::new();
        loop {
            match src.next() {
                None => return partial(src),
                Some(b'\r') => continue,
                Some(b'\n') => break,
                Some(byte) => value.push(byte),
            }
        }

        request.set_header(
            String::from_utf8_lossy(&key).into_owned(),
            String::from_utf8_lossy(&value).into_owned(),
        );
        src.commit();
    }
}

/// Rolls back to the last commit and reports that more bytes are needed.
fn partial(src: &mut Buffer) -> Result<DecodeState, ParseError> {
    src.rollback();
    Ok(DecodeState::Partial)
}

/// Accumulates bytes up to a space, or `None` on exhaustion.
fn read_until_space(src: &mut Buffer) -> Option<String> {
    let mut token = Vec::new();
    loop {
        match src.next()? {
            b' ' => return Some(String::from_utf8_lossy(&token).into_owned()),
            byte => token.push(byte),
        }
    }
}

/// Accumulates bytes up to a newline, ignoring carriage returns.
fn read_line(src: &mut Buffer) -> Option<String> {
    let mut token = Vec::new();
    loop {
        match src.next()? {
            b'\r' => continue,
            b'\n' => return Some(String::from_utf8_lossy(&token).into_owned()),
            byte => token.push(byte),
        }
    }
}
