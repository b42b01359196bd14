//! Handler trait and type erasure.
//!
//! # How the terminal handler is stored
//!
//! A [`Chain`](crate::middleware::Chain) ends in exactly one handler, but the
//! chain type cannot be generic over it without leaking that type into every
//! filter signature. The handler is therefore stored as a trait object
//! (`dyn ErasedHandler`):
//!
//! ```text
//! async fn app(req: Request<Body>) -> Result<Response<Body>, E>   ← user writes this
//!        ↓ Chain::new(app)
//! app.into_boxed_handler()                                         ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(app))                                         ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req) at request time                                ← one vtable dispatch
//!        ↓
//! Box::pin(async { app(req).await.map_err(Into::into) })          ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{Request, Response};

use crate::body::{Body, BoxError};

/// What every stage of the pipeline resolves to.
pub type HandlerResult = Result<Response<Body>, BoxError>;

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move it across worker threads; the lifetime lets filter
/// futures borrow the chain they run in.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid terminal handler.
///
/// Satisfied automatically by any `async fn` (or closure) with the shape:
///
/// ```text
/// async fn name(req: Request<Body>) -> Result<Response<Body>, E>
/// where E: Into<BoxError>
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, E> private::Sealed for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
}

impl<F, Fut, E> Handler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Body>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, HandlerResult> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}
