//! Unified error type.

use crate::body::BoxError;

/// The error type returned by tsu-trace's fallible operations.
///
/// Errors raised by the downstream stage are not wrapped in this type. They
/// travel as [`BoxError`] and reach the caller unchanged. `Error` covers the
/// failures that belong to the middleware and its hosting layer: binding a
/// port, loading configuration, and buffering bodies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to buffer request body")]
    RequestBody(#[source] BoxError),

    #[error("failed to replay response body")]
    ResponseBody(#[source] BoxError),

    #[error("invalid request url `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("host header is not visible ascii")]
    InvalidHost(#[from] http::header::ToStrError),
}
