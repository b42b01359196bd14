//! End-to-end: a real TCP client against `serve_with_shutdown`.

mod common;

use http::{Request, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tsu_trace::{Body, BoxError, Chain, HttpTrace, Server, TraceConfig, serve_with_shutdown};

use common::CapturedLogs;

async fn echo(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    if req.uri().path() == "/fail" {
        return Err("handler exploded".into());
    }
    let bytes = req.into_body().into_bytes().await?;
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("content-type", "application/octet-stream")
        .body(Body::from(bytes))?)
}

/// Sends one raw HTTP/1.1 request and reads until the server closes.
async fn roundtrip(addr: std::net::SocketAddr, head: &str, body: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    buf
}

fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("no header terminator");
    (String::from_utf8_lossy(&raw[..end]).into_owned(), raw[end + 4..].to_vec())
}

#[tokio::test]
async fn response_body_is_delivered_byte_for_byte() {
    let (logs, _guard) = CapturedLogs::install();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let chain = Chain::new(echo).filter(HttpTrace::new(TraceConfig::default()));
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, chain, async move {
        let _ = stopped.await;
    }));

    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let head = format!(
        "POST /api/echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        payload.len()
    );
    let raw = roundtrip(addr, &head, &payload).await;
    let (head, body) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 201"), "unexpected head: {head}");
    assert!(head.to_ascii_lowercase().contains("content-length: 4096"));
    assert_eq!(body, payload);

    let _ = stop.send(());
    server.await.unwrap().unwrap();

    let logs = logs.contents();
    assert!(logs.contains("path : /api/echo"));
    assert!(logs.contains("status : 201"));
}

#[tokio::test]
async fn handler_error_becomes_500_after_tracing() {
    let (logs, _guard) = CapturedLogs::install();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let chain = Chain::new(echo).filter(HttpTrace::new(TraceConfig::default()));
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, chain, async move {
        let _ = stopped.await;
    }));

    let raw = roundtrip(
        addr,
        "DELETE /fail HTTP/1.1\r\nhost: localhost\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        b"",
    )
    .await;
    let (head, body) = split_response(&raw);
    assert!(head.starts_with("HTTP/1.1 500"), "unexpected head: {head}");
    assert!(body.is_empty());

    let _ = stop.send(());
    server.await.unwrap().unwrap();

    let logs = logs.contents();
    let trace_at = logs.find("status : 500").expect("trace not logged");
    let failure_at = logs.find("request failed").expect("failure not logged");
    assert!(trace_at < failure_at);
}

#[tokio::test]
async fn serve_until_returns_when_the_caller_signal_fires() {
    let (logs, _guard) = CapturedLogs::install();

    let chain = Chain::new(echo).filter(HttpTrace::new(TraceConfig::default()));
    Server::bind("127.0.0.1:0").unwrap().serve_until(chain, async {}).await.unwrap();

    let logs = logs.contents();
    assert!(logs.contains("in_flight=0"));
    assert!(logs.contains("tsu-trace stopped"));
}
