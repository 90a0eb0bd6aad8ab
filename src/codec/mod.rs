//! Encoding and decoding of HTTP/1.1 messages.
//!
//! The decoder side is incremental: [`RequestDecoder`] consumes a cursored
//! [`Buffer`] in place and can be re-invoked whenever more bytes have been
//! appended, picking up at the last committed token boundary. The encoder
//! side is one-shot: [`ResponseEncoder`] serializes a whole response into an
//! outbound [`Buffer`] whose cursor then tracks how much has been written to
//! the socket.

mod buffer;
mod request_decoder;
mod response_encoder;

pub use buffer::Buffer;
pub use request_decoder::{DecodeState, RequestDecoder, MAX_HEADER_SIZE};
pub use response_encoder::ResponseEncoder;
