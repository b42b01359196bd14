//! HTTP trace middleware.
//!
//! For every request that does not match an ignore rule:
//!
//! 1. Buffer the request body so the handler and the trace both see it.
//! 2. Start the clock and run the downstream stage.
//! 3. Buffer the response body it produced.
//! 4. Log a [`TraceRecord`] at `info` under [`TRACE_TARGET`], whether the
//!    stage succeeded or not.
//! 5. Hand back the buffered response, or the stage's own error, unchanged.
//!
//! ```rust,no_run
//! use tsu_trace::middleware::{Chain, HttpTrace};
//! use tsu_trace::{Body, BoxError, Server, TraceConfig};
//! use http::{Request, Response};
//!
//! async fn app(_req: Request<Body>) -> Result<Response<Body>, BoxError> {
//!     Ok(Response::new(Body::from("ok")))
//! }
//!
//! # async fn run() -> Result<(), tsu_trace::Error> {
//! let chain = Chain::new(app).filter(HttpTrace::new(TraceConfig::from_env()));
//! Server::bind("0.0.0.0:3000")?.serve(chain).await
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use http::{Request, Response};
use tracing::{debug, info};

use crate::body::{Body, BoxError};
use crate::config::TraceConfig;
use crate::error::Error;
use crate::handler::{BoxFuture, HandlerResult};
use crate::middleware::ignore::should_ignore;
use crate::middleware::record::{RequestSnapshot, TraceRecord};
use crate::middleware::{Filter, LOWEST_PRECEDENCE, Next};

/// Log target of trace records, for filtering them apart from the rest of
/// the crate (`RUST_LOG=tsu_trace::http_trace=info`).
pub const TRACE_TARGET: &str = "tsu_trace::http_trace";

/// Request extension set once a request has been traced, so a second trace
/// filter further down the chain lets it through.
#[derive(Debug, Clone, Copy)]
struct Traced;

/// The trace filter. Cheap to clone; every clone shares one configuration.
#[derive(Debug, Clone)]
pub struct HttpTrace {
    config: Arc<TraceConfig>,
}

impl HttpTrace {
    pub fn new(config: TraceConfig) -> Self {
        Self::shared(Arc::new(config))
    }

    pub fn shared(config: Arc<TraceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Runs `next` on `req`, tracing the exchange unless an ignore rule
    /// matches.
    ///
    /// `next` is consumed: the downstream stage runs exactly once. Its error
    /// is returned as is, after the trace has been logged. The only errors
    /// this filter adds are failures reading the request body (before
    /// `next` runs) and reading the response body (after the trace).
    pub async fn handle<F, Fut>(&self, mut req: Request<Body>, next: F) -> HandlerResult
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = HandlerResult>,
    {
        if req.extensions().get::<Traced>().is_some() || should_ignore(&self.config, &req) {
            debug!(method = %req.method(), path = req.uri().path(), "trace skipped");
            return next(req).await;
        }
        req.extensions_mut().insert(Traced);

        let (parts, body) = req.into_parts();
        let body = body.buffer().await.map_err(|e| boxed(Error::RequestBody(e)))?;
        let req = Request::from_parts(parts, body);
        let snapshot = RequestSnapshot::capture(&req, req.body().as_bytes().cloned());

        let start = Instant::now();
        let outcome = next(req).await;

        let (result, status, response_body) = match outcome {
            Ok(res) => {
                let (parts, body) = res.into_parts();
                let status = parts.status;
                match body.buffer().await {
                    Ok(body) => {
                        let bytes = body.as_bytes().cloned();
                        (Ok(Response::from_parts(parts, body)), Some(status), bytes)
                    }
                    Err(e) => (Err(boxed(Error::ResponseBody(e))), Some(status), None),
                }
            }
            Err(e) => (Err(e), None, None),
        };

        let record = TraceRecord::build(&snapshot, status, response_body.as_ref(), start.elapsed());
        info!(target: TRACE_TARGET, "{record}");

        result
    }
}

impl Filter for HttpTrace {
    /// Close to the handler, so the trace sees the final response.
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 10
    }

    fn call<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(self.handle(req, move |req| next.run(req)))
    }
}

fn boxed(e: Error) -> BoxError {
    Box::new(e)
}
