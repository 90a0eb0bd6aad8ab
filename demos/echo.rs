//! Echoes the request body back, reading it in chunks as segments arrive.

use solo_http::{handler_fn, Server, ServerError};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), ServerError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut server = Server::bind_tcp("127.0.0.1", 8080)?;
    server.register("/echo", "POST", handler_fn(|req, mut resp, mut body| async move {
        let mut collected = Vec::new();
        loop {
            let chunk = body.read(4096).await?;
            if chunk.is_empty() {
                break;
            }
            collected.extend_from_slice(&chunk);
        }

        let content_type = req.header("Content-Type").unwrap_or("application/octet-stream");
        resp.set_content_type(content_type).set_body(collected);
        Ok(resp)
    }));

    server.serve()
}
