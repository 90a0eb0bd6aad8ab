//! One-shot HTTP/1.1 response serializer.

use crate::codec::Buffer;
use crate::protocol::Response;

/// Serializes a whole response into an outbound buffer.
///
/// Unlike the decoder this is not incremental: the status line, headers and
/// body are emitted in a single call. The buffer's cursor starts at zero and
/// is advanced by the connection machinery as bytes reach the socket.
#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Replaces `dst` with the serialized response.
    ///
    /// Headers with empty values are skipped. Header order follows map
    /// iteration and carries no meaning.
    pub fn encode(&mut self, response: &Response, dst: &mut Buffer) {
        let status_line = format!(
            "{} {} {}\r\n",
            response.version(),
            response.status_code(),
            response.status_reason()
        );
        dst.assign(status_line.as_bytes());

        for (key, value) in response.headers() {
            if value.is_empty() {
                continue;
            }
            dst.append(format!("{key}: {value}\r\n").as_bytes());
        }

        dst.append(b"\r\n");
        dst.append(response.body());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn encode(response: &Response) -> String {
        let mut buffer = Buffer::new();
        ResponseEncoder::new().encode(response, &mut buffer);
        assert_eq!(buffer.size_before_cursor(), 0);
        String::from_utf8(buffer.bytes_after_cursor().to_vec()).unwrap()
    }

    #[test]
    fn status_line_headers_and_body() {
        let mut response = Response::new();
        response.set_content_type("text/plain").set_body("pong");

        let text = encode(&response);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\npong"));
    }

    #[test]
    fn empty_body_still_terminates_the_header_block() {
        let text = encode(&Response::new());
        assert_eq!(text, "HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn empty_header_values_are_skipped() {
        let mut response = Response::new();
        response.set_status(StatusCode::NO_CONTENT).set_header("X-Debug", "");

        let text = encode(&response);
        assert_eq!(text, "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn encoding_twice_resets_the_buffer() {
        let mut encoder = ResponseEncoder::new();
        let mut buffer = Buffer::new();

        let mut response = Response::new();
        response.set_body("first");
        encoder.encode(&response, &mut buffer);
        buffer.increment(buffer.size_after_cursor());

        response.set_body("second");
        encoder.encode(&response, &mut buffer);
        assert_eq!(buffer.size_before_cursor(), 0);
        let text = String::from_utf8(buffer.bytes_after_cursor().to_vec()).unwrap();
        assert!(text.ends_with("\r\n\r\nsecond"));
    }
}
