use solo_http::{handler_fn, Server, ServerError};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), ServerError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut server = Server::bind_tcp("127.0.0.1", 8080)?;
    server.register("/ping", "GET", handler_fn(|_req, mut resp, _body| async move {
        resp.set_content_type("text/plain").set_body("pong");
        Ok(resp)
    }));

    server.serve()
}
