//! # tsu-trace
//!
//! HTTP trace logging for hyper services. One filter, one log record per
//! request, nothing stored.
//!
//! ## What it does
//!
//! [`HttpTrace`] sits near the end of a middleware [`Chain`]. For each
//! request it buffers both bodies, times the downstream stage, and logs a
//! [`TraceRecord`] at `info`:
//!
//! ```text
//! HttpTraceLog {
//!   path : /users
//!   parameterMap : {"page":["1"]}
//!   authorization : Bearer abc
//!   method : POST
//!   timeTaken : 42ms
//!   time : 2026-10-19T09:17:00.123
//!   status : 201
//!   requestBody : {"name":"alice"}
//!   responseBody : {"id":"99"}
//! }
//! ```
//!
//! Requests whose path contains an `ignore_urls` entry, or whose method
//! contains an `ignore_methods` entry, pass through untraced. See
//! [`TraceConfig`].
//!
//! What it leaves to others: log shipping, sampling, cross-service
//! correlation, metrics. Install whatever `tracing` subscriber you already
//! use.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Request, Response, StatusCode};
//! use tsu_trace::{Body, BoxError, Chain, HttpTrace, Server, TraceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsu_trace::Error> {
//!     let chain = Chain::new(create_user).filter(HttpTrace::new(TraceConfig::from_env()));
//!     Server::bind("0.0.0.0:3000")?.serve(chain).await
//! }
//!
//! async fn create_user(req: Request<Body>) -> Result<Response<Body>, BoxError> {
//!     if req.body().as_bytes().is_none_or(|b| b.is_empty()) {
//!         let mut res = Response::new(Body::empty());
//!         *res.status_mut() = StatusCode::BAD_REQUEST;
//!         return Ok(res);
//!     }
//!     Ok(Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .body(Body::from(r#"{"id":"99"}"#))?)
//! }
//! ```

mod body;
mod config;
mod error;
mod handler;
mod server;

pub mod middleware;

pub use body::{Body, BoxError};
pub use config::{ENV_IGNORE_METHODS, ENV_IGNORE_URLS, TraceConfig};
pub use error::Error;
pub use handler::{BoxFuture, Handler, HandlerResult};
pub use middleware::{Chain, Filter, HttpTrace, Next, TRACE_TARGET, TraceRecord};
pub use server::{Server, serve_with_shutdown};
