//! Request and response body type.
//!
//! A body is either still streaming off the wire ([`Body::Raw`]) or fully
//! held in memory ([`Body::Buffered`]). The trace middleware needs to read a
//! body twice: once by the downstream stage that consumes it, once by the
//! trace record after the fact. A buffered body makes that cheap: cloning
//! [`Bytes`] is a reference-count increment, not a copy.
//!
//! ```rust
//! # async fn demo() -> Result<(), tsu_trace::BoxError> {
//! use tsu_trace::Body;
//!
//! let body = Body::from("hello").buffer().await?;
//! assert_eq!(body.as_bytes().map(|b| &b[..]), Some(&b"hello"[..]));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::{Body as HttpBody, Frame, SizeHint};

/// Boxed error used at every stage boundary of the pipeline.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An HTTP body, either streaming or buffered.
pub enum Body {
    /// A body that has not been read yet.
    Raw(UnsyncBoxBody<Bytes, BoxError>),
    /// A body held entirely in memory. Can be read any number of times via
    /// [`Body::as_bytes`].
    Buffered(Bytes),
}

impl Body {
    /// An empty, already-buffered body.
    pub fn empty() -> Self {
        Self::Buffered(Bytes::new())
    }

    /// Wraps any streaming body, e.g. hyper's `Incoming`.
    pub fn from_stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Raw(body.map_err(Into::into).boxed_unsync())
    }

    /// Reads a raw body to the end and returns it buffered.
    ///
    /// Idempotent: a body that is already buffered is returned untouched, so
    /// nested middleware never buffers the same body twice.
    pub async fn buffer(self) -> Result<Self, BoxError> {
        self.into_bytes().await.map(Self::Buffered)
    }

    /// The buffered bytes, or `None` while the body is still streaming.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Buffered(bytes) => Some(bytes),
            Self::Raw(_) => None,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }

    /// Consumes the body and returns all of its bytes.
    pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Raw(inner) => Ok(inner.collect().await?.to_bytes()),
        }
    }
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(_) => f.write_str("Body::Raw(..)"),
            Self::Buffered(bytes) => f.debug_tuple("Body::Buffered").field(&bytes.len()).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self { Self::Buffered(bytes) }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self { Self::Buffered(Bytes::from(bytes)) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Buffered(Bytes::from(s)) }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::Buffered(Bytes::from_static(s.as_bytes())) }
}

// ── hyper integration ─────────────────────────────────────────────────────────

/// Streaming a buffered body hands its bytes to hyper in a single frame and
/// leaves the variant empty. This is the one-time replay onto the wire.
impl HttpBody for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Raw(inner) => Pin::new(inner).poll_frame(cx),
            Self::Buffered(bytes) if bytes.is_empty() => Poll::Ready(None),
            Self::Buffered(bytes) => Poll::Ready(Some(Ok(Frame::data(std::mem::take(bytes))))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Raw(inner) => inner.is_end_stream(),
            Self::Buffered(bytes) => bytes.is_empty(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Raw(inner) => inner.size_hint(),
            Self::Buffered(bytes) => SizeHint::with_exact(bytes.len() as u64),
        }
    }
}
