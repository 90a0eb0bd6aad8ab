//! End-to-end tests against a served instance, with plain blocking sockets
//! playing the client side.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use solo_http::{handler_fn, Server, ServerError};

fn ping_route(server: &mut Server) {
    server.register("/ping", "GET", handler_fn(|_req, mut resp, _body| async move {
        resp.set_content_type("text/plain").set_body("pong");
        Ok(resp)
    }));
}

fn upload_route(server: &mut Server) {
    server.register("/up", "POST", handler_fn(|_req, mut resp, mut body| async move {
        let mut total = 0;
        for size in [4096usize, 4096, 4096, 1000] {
            total += body.read(size).await?.len();
        }
        resp.set_content_type("text/plain").set_body(total.to_string());
        Ok(resp)
    }));
}

fn start(configure: fn(&mut Server)) -> (Arc<Server>, SocketAddr, JoinHandle<Result<(), ServerError>>) {
    let mut server = Server::bind_tcp("127.0.0.1", 0).unwrap();
    configure(&mut server);
    let addr = server.local_addr().unwrap();

    let server = Arc::new(server);
    let serving = Arc::clone(&server);
    let handle = thread::spawn(move || serving.serve());

    (server, addr, handle)
}

/// The listener only starts inside `serve`, so early connects are refused.
fn connect(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("server never started listening on {addr}");
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Reads one full response, returning the header text and the body.
fn read_response(stream: &mut impl Read) -> (String, Vec<u8>) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_subslice(&raw, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before the header block was complete");
        raw.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(raw[..header_end].to_vec()).unwrap();
    let content_length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .map(|value| value.trim().parse().unwrap())
        .unwrap_or(0);

    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before the body was complete");
        body.extend_from_slice(&chunk[..n]);
    }

    (head, body)
}

#[test]
fn keep_alive_serves_sequential_requests() {
    let (server, addr, handle) = start(ping_route);
    let mut stream = connect(addr);

    for _ in 0..3 {
        stream.write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut stream);

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected head: {head}");
        assert!(head.contains("Content-Length: 4"));
        assert!(head.contains("Content-Type: text/plain"));
        let date = head.lines().find_map(|line| line.strip_prefix("Date: ")).expect("date header missing");
        assert!(date.ends_with("GMT"));
        assert_eq!(body, b"pong");
    }

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn connection_close_is_honored() {
    let (server, addr, handle) = start(ping_route);
    let mut stream = connect(addr);

    stream.write_all(b"GET /ping HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"pong");

    // the server side closes: the next read returns EOF
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn unknown_path_is_a_404() {
    let (server, addr, handle) = start(ping_route);
    let mut stream = connect(addr);

    stream.write_all(b"GET /nope HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);

    assert!(head.starts_with("HTTP/1.1 404 Not Found"), "unexpected head: {head}");
    assert!(String::from_utf8(body).unwrap().starts_with("The requested resource /nope was not found"));

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn unregistered_method_is_a_405() {
    let (server, addr, handle) = start(ping_route);
    let mut stream = connect(addr);

    stream.write_all(b"POST /ping HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);

    assert!(head.starts_with("HTTP/1.1 405 Method Not Allowed"), "unexpected head: {head}");
    assert!(String::from_utf8(body).unwrap().contains("POST"));

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn malformed_header_is_a_400() {
    let (server, addr, handle) = start(ping_route);
    let mut stream = connect(addr);

    // missing the space after the colon
    stream.write_all(b"GET / HTTP/1.1\r\nBad:value\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);

    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "unexpected head: {head}");
    assert!(!body.is_empty(), "the 400 should describe the error");

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn oversize_header_block_is_a_400() {
    let (server, addr, handle) = start(ping_route);

    let skeleton = "GET /ping HTTP/1.1\r\nX-Pad: \r\n\r\n";

    // exactly at the 8192-byte limit: served normally
    let mut stream = connect(addr);
    let exact = format!("GET /ping HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "a".repeat(8192 - skeleton.len()));
    assert_eq!(exact.len(), 8192);
    stream.write_all(exact.as_bytes()).unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "unexpected head: {head}");
    assert_eq!(body, b"pong");

    // one byte over: rejected
    let mut stream = connect(addr);
    let over = format!("GET /ping HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "a".repeat(8193 - skeleton.len()));
    stream.write_all(over.as_bytes()).unwrap();
    let (head, _) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "unexpected head: {head}");

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn body_streams_across_segments_without_starving_others() {
    let (server, addr, handle) = start(|server| {
        ping_route(server);
        upload_route(server);
    });

    let mut upload = connect(addr);
    upload.write_all(b"POST /up HTTP/1.1\r\nContent-Length: 10000\r\n\r\n").unwrap();

    let payload = vec![b'x'; 10000];
    for segment in payload.chunks(2500) {
        upload.write_all(segment).unwrap();
        upload.flush().unwrap();
        thread::sleep(Duration::from_millis(30));

        // the upload handler is suspended mid-body; other connections
        // must still be served
        let mut other = connect(addr);
        other.write_all(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut other);
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body, b"pong");
    }

    let (head, body) = read_response(&mut upload);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "unexpected head: {head}");
    assert_eq!(body, b"10000", "every read should have succeeded, totalling the body");

    server.kill();
    handle.join().unwrap().unwrap();
}

#[test]
fn kill_makes_serve_return_with_a_connection_parked() {
    let (server, addr, handle) = start(ping_route);

    // park one connection mid-request
    let mut parked = connect(addr);
    parked.write_all(b"GET /pi").unwrap();
    thread::sleep(Duration::from_millis(100));

    server.kill();
    handle.join().unwrap().unwrap();

    // killing again is a no-op
    server.kill();

    // the parked connection was dropped by the loop
    parked.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut rest = Vec::new();
    parked.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
}

#[test]
fn serves_over_a_unix_socket() {
    let path = std::env::temp_dir().join(format!("solo-http-test-{}.sock", std::process::id()));
    let mut server = Server::bind_unix(&path).unwrap();
    ping_route(&mut server);

    let server = Arc::new(server);
    let serving = Arc::clone(&server);
    let handle = thread::spawn(move || serving.serve());

    let mut stream = None;
    for _ in 0..100 {
        match UnixStream::connect(&path) {
            Ok(connected) => {
                stream = Some(connected);
                break;
            }
            Err(_) => thread::sleep(Duration::from_millis(20)),
        }
    }
    let mut stream = stream.expect("server never started listening on the unix socket");

    stream.write_all(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(body, b"pong");

    server.kill();
    handle.join().unwrap().unwrap();
    let _ = std::fs::remove_file(&path);
}
