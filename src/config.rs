//! Trace filter configuration.
//!
//! Loaded once at startup and shared read-only by every request, usually
//! behind an `Arc`. Three sources, in the order most services reach for them:
//!
//! | Source | Entry point |
//! |---|---|
//! | Built-in defaults | [`TraceConfig::default`] |
//! | `[http_trace]` table of a TOML file | [`TraceConfig::load`] / [`TraceConfig::from_toml_str`] |
//! | Environment | [`TraceConfig::from_env`] |
//!
//! ```toml
//! [http_trace]
//! ignore_urls    = "/export,/health"
//! ignore_methods = "GET,OPTIONS"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const ENV_IGNORE_URLS: &str = "HTTP_TRACE_IGNORE_URLS";
pub const ENV_IGNORE_METHODS: &str = "HTTP_TRACE_IGNORE_METHODS";

const DEFAULT_IGNORE_URLS: &str = "/export,/health";
const DEFAULT_IGNORE_METHODS: &str = "GET";

/// Ignore rules for the trace filter.
///
/// Both fields are comma-separated lists matched by substring, see
/// [`middleware::ignore`](crate::middleware::ignore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// URL path fragments that bypass tracing.
    pub ignore_urls: String,
    /// HTTP methods that bypass tracing.
    pub ignore_methods: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            ignore_urls: DEFAULT_IGNORE_URLS.to_owned(),
            ignore_methods: DEFAULT_IGNORE_METHODS.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    http_trace: TraceConfig,
}

impl TraceConfig {
    /// Reads the `[http_trace]` table from a TOML file. A missing table or
    /// missing keys fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.http_trace)
    }

    /// Reads `HTTP_TRACE_IGNORE_URLS` and `HTTP_TRACE_IGNORE_METHODS`.
    /// Unset variables keep their default. A variable set to the empty
    /// string disables that rule.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            ignore_urls: lookup(ENV_IGNORE_URLS).unwrap_or(defaults.ignore_urls),
            ignore_methods: lookup(ENV_IGNORE_METHODS).unwrap_or(defaults.ignore_methods),
        }
    }
}
