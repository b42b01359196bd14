//! The trace record: one summary line block per request/response cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use tracing::error;
use url::form_urlencoded;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Status reported when the downstream never produced a response.
pub const DEFAULT_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

/// What the trace needs from the request, captured before the request is
/// handed to the downstream stage.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestSnapshot {
    /// `body` is the buffered request body, or `None` when the request was
    /// not buffered.
    pub fn capture<B>(req: &Request<B>, body: Option<Bytes>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            body,
        }
    }
}

/// Summary of one request/response cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    path: String,
    parameter_map: String,
    authorization: Option<String>,
    method: String,
    time_taken: u64,
    time: String,
    status: u16,
    request_body: String,
    response_body: String,
}

impl TraceRecord {
    /// Builds the record once the downstream stage has finished.
    ///
    /// `status` is `None` when the downstream failed without producing a
    /// response; the record then reports `500`.
    pub fn build(
        request: &RequestSnapshot,
        status: Option<StatusCode>,
        response_body: Option<&Bytes>,
        elapsed: Duration,
    ) -> Self {
        Self {
            path: request.uri.path().to_owned(),
            parameter_map: parameter_map(request),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
            method: request.method.as_str().to_owned(),
            time_taken: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            time: chrono::Local::now().format(TIME_FORMAT).to_string(),
            status: status.unwrap_or(DEFAULT_STATUS).as_u16(),
            request_body: decode_body("request", request.body.as_ref()),
            response_body: decode_body("response", response_body),
        }
    }

    pub fn path(&self) -> &str { &self.path }
    pub fn parameter_map(&self) -> &str { &self.parameter_map }
    pub fn authorization(&self) -> Option<&str> { self.authorization.as_deref() }
    pub fn method(&self) -> &str { &self.method }
    pub fn time_taken(&self) -> u64 { self.time_taken }
    pub fn time(&self) -> &str { &self.time }
    pub fn status(&self) -> u16 { self.status }
    pub fn request_body(&self) -> &str { &self.request_body }
    pub fn response_body(&self) -> &str { &self.response_body }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HttpTraceLog {{ ")?;
        writeln!(f, "  path : {}", self.path)?;
        writeln!(f, "  parameterMap : {}", self.parameter_map)?;
        writeln!(f, "  authorization : {}", self.authorization.as_deref().unwrap_or("null"))?;
        writeln!(f, "  method : {}", self.method)?;
        writeln!(f, "  timeTaken : {}ms", self.time_taken)?;
        writeln!(f, "  time : {}", self.time)?;
        writeln!(f, "  status : {}", self.status)?;
        writeln!(f, "  requestBody : {}", self.request_body)?;
        writeln!(f, "  responseBody : {}", self.response_body)?;
        f.write_str("}")
    }
}

/// Query parameters, plus form parameters for urlencoded bodies, as a JSON
/// object of string arrays: `{"tag":["a","b"]}`.
fn parameter_map(request: &RequestSnapshot) -> String {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut collect = |input: &[u8]| {
        for (name, value) in form_urlencoded::parse(input) {
            params.entry(name.into_owned()).or_default().push(value.into_owned());
        }
    };

    if let Some(query) = request.uri.query() {
        collect(query.as_bytes());
    }
    if is_form(&request.headers) {
        if let Some(body) = &request.body {
            collect(&body[..]);
        }
    }

    serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_owned())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// UTF-8 text of a buffered body. Missing bodies and undecodable bytes both
/// yield the empty string; the latter is logged.
fn decode_body(kind: &str, body: Option<&Bytes>) -> String {
    let Some(bytes) = body else {
        return String::new();
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(e) => {
            error!(body = kind, error = %e, "{kind} body parse failure");
            String::new()
        }
    }
}
