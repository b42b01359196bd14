//! Ignore rules: which requests bypass tracing.
//!
//! Rules are plain substrings, not globs or path segments. `/export` also
//! ignores `/exporter/x`, and a method list of `GET` also ignores any method
//! that merely contains `GET`.

use http::Request;
use http::header::HOST;
use tracing::error;
use url::Url;

use crate::config::TraceConfig;
use crate::error::Error;

/// True if any comma-separated rule in `rules` is a substring of `value`.
///
/// An empty rule list or an empty value never matches. Trailing empty rules
/// are dropped (`"/a,"` is the single rule `/a`); a leading or interior empty
/// rule is the empty substring and matches every non-empty value.
///
/// ```rust
/// use tsu_trace::middleware::ignore::matches;
///
/// assert!(matches("/export,/health", "/export/data"));
/// assert!(!matches("", "/export"));
/// assert!(!matches("/export,/health", ""));
/// ```
pub fn matches(rules: &str, value: &str) -> bool {
    let rules = rules.trim_end_matches(',');
    if rules.is_empty() || value.is_empty() {
        return false;
    }
    rules.split(',').any(|rule| value.contains(rule))
}

/// Whether `req` should skip tracing under `config`.
///
/// Never fails. If the request URL cannot be validated the error is logged
/// and the request is traced.
pub fn should_ignore<B>(config: &TraceConfig, req: &Request<B>) -> bool {
    match check(config, req) {
        Ok(ignored) => ignored,
        Err(e) => {
            error!(uri = %req.uri(), error = %e, "ignore check failed, tracing request");
            false
        }
    }
}

fn check<B>(config: &TraceConfig, req: &Request<B>) -> Result<bool, Error> {
    request_url(req)?;

    let by_url = matches(&config.ignore_urls, req.uri().path());
    let by_method = matches(&config.ignore_methods, req.method().as_str());
    Ok(by_url || by_method)
}

/// Reconstructs the absolute URL the client asked for.
///
/// HTTP/2 and proxy requests carry it in the request line already. Origin-form
/// HTTP/1.1 requests are rebuilt from the `Host` header, falling back to
/// `localhost` when it is absent.
pub fn request_url<B>(req: &Request<B>) -> Result<Url, Error> {
    let uri = req.uri();
    let raw = if uri.scheme().is_some() && uri.authority().is_some() {
        uri.to_string()
    } else {
        let host = match req.headers().get(HOST) {
            Some(value) => value.to_str()?,
            None => "localhost",
        };
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("http://{host}{path}")
    };

    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method};

    use super::*;

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, "api.example.com")
            .body(())
            .unwrap()
    }

    #[test]
    fn empty_rules_or_value_never_match() {
        assert!(!matches("", "/export"));
        assert!(!matches("/export,/health", ""));
        assert!(!matches("", ""));
    }

    #[test]
    fn any_rule_as_substring_matches() {
        assert!(matches("/export,/health", "/export/data"));
        assert!(matches("/export,/health", "/api/healthz"));
        assert!(matches("GET", "GET"));
        assert!(!matches("/export,/health", "/api/users"));
        assert!(!matches("GET", "POST"));
    }

    #[test]
    fn substring_match_is_loose() {
        assert!(matches("/export", "/exporter/x"));
        assert!(matches("/export", "/v1/export"));
    }

    #[test]
    fn rules_are_not_trimmed() {
        assert!(!matches("/export, /health", "/health"));
        assert!(matches("/export, /health", "/x /health"));
    }

    #[test]
    fn trailing_separators_are_dropped_but_inner_empty_rules_match() {
        assert!(!matches("/export,", "/api"));
        assert!(!matches(",,,", "/api"));
        assert!(matches("/export,,/health", "/api"));
        assert!(matches(",/export", "/api"));
    }

    #[test]
    fn url_match_ignores_regardless_of_method() {
        let config = TraceConfig::default();
        assert!(should_ignore(&config, &request(Method::POST, "/export/data")));
        assert!(should_ignore(&config, &request(Method::DELETE, "/health")));
    }

    #[test]
    fn method_match_ignores_regardless_of_url() {
        let config = TraceConfig::default();
        assert!(should_ignore(&config, &request(Method::GET, "/api/users")));
    }

    #[test]
    fn unmatched_request_is_traced() {
        let config = TraceConfig::default();
        assert!(!should_ignore(&config, &request(Method::POST, "/api/users")));
    }

    #[test]
    fn query_string_is_not_part_of_the_url_rule() {
        let config = TraceConfig::default();
        assert!(!should_ignore(&config, &request(Method::POST, "/api/users?next=/export")));
    }

    #[test]
    fn empty_config_traces_everything() {
        let config = TraceConfig { ignore_urls: String::new(), ignore_methods: String::new() };
        assert!(!should_ignore(&config, &request(Method::GET, "/export")));
    }

    #[test]
    fn request_url_is_rebuilt_from_host() {
        let url = request_url(&request(Method::POST, "/api/users?page=2")).unwrap();
        assert_eq!(url.as_str(), "http://api.example.com/api/users?page=2");
    }

    #[test]
    fn absolute_form_uri_is_used_as_is() {
        let req = Request::builder()
            .uri("https://svc.internal:8443/api/users")
            .body(())
            .unwrap();
        let url = request_url(&req).unwrap();
        assert_eq!(url.as_str(), "https://svc.internal:8443/api/users");
    }

    #[test]
    fn missing_host_falls_back_to_localhost() {
        let req = Request::builder().uri("/api").body(()).unwrap();
        assert_eq!(request_url(&req).unwrap().as_str(), "http://localhost/api");
    }

    #[test]
    fn malformed_url_is_traced_not_ignored() {
        let mut req = request(Method::GET, "/export");
        req.headers_mut().insert(HOST, HeaderValue::from_static("bad host"));

        assert!(matches!(request_url(&req), Err(Error::InvalidUrl { .. })));
        // GET and /export would both match, but validation fails first
        assert!(!should_ignore(&TraceConfig::default(), &req));
    }

    #[test]
    fn non_text_host_is_traced_not_ignored() {
        let mut req = request(Method::GET, "/export");
        req.headers_mut().insert(HOST, HeaderValue::from_bytes(b"caf\xe9").unwrap());

        assert!(matches!(request_url(&req), Err(Error::InvalidHost(_))));
        assert!(!should_ignore(&TraceConfig::default(), &req));
    }
}
