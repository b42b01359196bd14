//! Minimal tsu-trace example: a tiny JSON API with trace logging.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Only the trace records:
//!   RUST_LOG=tsu_trace::http_trace=info cargo run --example basic
//!
//! Try:
//!   curl -X POST http://localhost:3000/users \
//!        -H 'authorization: Bearer abc' \
//!        -d '{"name":"alice"}'                     # traced
//!   curl http://localhost:3000/users/42             # GET: ignored
//!   curl -X POST http://localhost:3000/export/csv   # /export: ignored
//!   curl http://localhost:3000/healthz              # /health: ignored
//!
//! Override the ignore rules:
//!   HTTP_TRACE_IGNORE_METHODS=OPTIONS cargo run --example basic

use http::{Method, Request, Response, StatusCode};
use tracing_subscriber::EnvFilter;
use tsu_trace::{Body, BoxError, Chain, HttpTrace, Server, TraceConfig};

#[tokio::main]
async fn main() -> Result<(), tsu_trace::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let chain = Chain::new(app).filter(HttpTrace::new(TraceConfig::from_env()));

    Server::bind("0.0.0.0:3000")?.serve(chain).await
}

async fn app(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") => Ok(Response::new(Body::from("ok"))),
        (&Method::GET, path) if path.starts_with("/users/") => {
            let id = &path["/users/".len()..];
            Ok(json(StatusCode::OK, format!(r#"{{"id":"{id}","name":"alice"}}"#)))
        }
        (&Method::POST, "/users") => create_user(req).await,
        (&Method::POST, path) if path.starts_with("/export") => {
            Ok(json(StatusCode::OK, r#"{"rows":0}"#.to_owned()))
        }
        _ => Ok(json(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.to_owned())),
    }
}

// POST /users
//
// The trace filter already buffered the body; the handler reads the same
// bytes the trace record will show.
async fn create_user(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    let body = req.into_body().into_bytes().await?;
    if body.is_empty() {
        return Ok(json(StatusCode::BAD_REQUEST, r#"{"error":"empty body"}"#.to_owned()));
    }

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("content-type", "application/json")
        .header("location", "/users/99")
        .body(Body::from(r#"{"id":"99","name":"new_user"}"#))?)
}

fn json(status: StatusCode, body: String) -> Response<Body> {
    let mut res = Response::new(Body::from(body));
    *res.status_mut() = status;
    res.headers_mut().insert("content-type", http::HeaderValue::from_static("application/json"));
    res
}
