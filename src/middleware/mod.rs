//! Middleware layer.
//!
//! A [`Chain`] is an ordered list of [`Filter`]s in front of one terminal
//! [`Handler`]. Each filter receives the request and a [`Next`] continuation
//! for the rest of the chain. It may short-circuit, or run `next` and
//! inspect what comes back.
//!
//! Filters run in ascending [`Filter::order`]. Ties keep registration order.
//! A filter that must observe the response exactly as the client will see it
//! (like [`HttpTrace`]) reports a high order so it sits closest to the
//! handler.
//!
//! Built-in middleware:
//! - [`trace`]: per-request trace record with method, path, status,
//!   latency and both bodies.

pub mod ignore;
pub mod record;
pub mod trace;

use std::sync::Arc;

use http::Request;

use crate::body::Body;
use crate::handler::{BoxFuture, BoxedHandler, Handler, HandlerResult};

pub use record::TraceRecord;
pub use trace::{HttpTrace, TRACE_TARGET};

/// Order of the filter that runs last.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;
/// Order of the filter that runs first.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// A stage in front of the terminal handler.
///
/// ```rust
/// use http::Request;
/// use tsu_trace::middleware::{Filter, Next};
/// use tsu_trace::{Body, BoxFuture, HandlerResult};
///
/// struct RequestId;
///
/// impl Filter for RequestId {
///     fn call<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
///         req.headers_mut().insert("x-request-id", http::HeaderValue::from_static("42"));
///         Box::pin(next.run(req))
///     }
/// }
/// ```
pub trait Filter: Send + Sync + 'static {
    /// Position in the chain; lower runs earlier.
    fn order(&self) -> i32 {
        0
    }

    fn call<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, HandlerResult>;
}

/// The rest of the chain, as seen from inside a filter.
///
/// [`run`](Next::run) takes `self` by value, so a filter can invoke the
/// downstream stage at most once.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: Request<Body>) -> HandlerResult {
        match self.filters.split_first() {
            Some((filter, rest)) => {
                let next = Next { filters: rest, endpoint: self.endpoint };
                filter.call(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// Filters plus the terminal handler. Build once at startup, share by `Arc`.
pub struct Chain {
    filters: Vec<Arc<dyn Filter>>,
    endpoint: BoxedHandler,
}

impl Chain {
    pub fn new(endpoint: impl Handler) -> Self {
        Self { filters: Vec::new(), endpoint: endpoint.into_boxed_handler() }
    }

    /// Adds a filter. Returns `self` for chaining.
    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        // stable: equal orders keep registration order
        self.filters.sort_by_key(|f| f.order());
        self
    }

    /// Runs `req` through every filter and the handler.
    pub async fn run(&self, req: Request<Body>) -> HandlerResult {
        Next { filters: &self.filters, endpoint: &self.endpoint }.run(req).await
    }
}
