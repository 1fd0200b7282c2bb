//! Error types for the engine's library surface.
//!
//! The CLI boundary (`main.rs`, `cmd/`) keeps using `anyhow`, the way the
//! teacher's `cmd/run.rs` does; the engine itself returns typed errors so
//! callers can distinguish quarantine from preflight failure from bad config.

use thiserror::Error;

/// Errors surfaced while following a redirect chain.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RedirectError {
    #[error("exceeded max_redirects")]
    TooManyRedirects,
    #[error("redirect response missing Location header")]
    MissingLocation,
}

/// Per-target lifecycle errors.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to pass preflight checks: {0}")]
    FailedPreflight(String),
    #[error("target quarantined")]
    Quarantined,
}

/// Configuration validation errors.
#[derive(Debug, Error)]
#[error("config has invalid values in: {}", .fields.join(", "))]
pub struct ConfigError {
    pub fields: Vec<String>,
}

/// Errors resulting from failing response validation checks.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("failed on content length check")]
    LengthMatch,
    #[error("failed on adjusted content length check")]
    ScaledLengthMatch,
    #[error("failed on word and line count match")]
    WordCountMatch,
    #[error("failed on content length range match")]
    ContentLengthRangeMatch,
    #[error("failed with blacklisted status code")]
    BlacklistedStatusCode,
    #[error("failed with not whitelisted status code")]
    WhitelistedStatusCode,
    #[error("google bad request found")]
    GoogleBadRequest,
    #[error("amazon gateway bad request found")]
    AmazonGatewayBadRequest,
}

/// A single parse failure accumulated while loading a route schema, carrying
/// `{id, method, route, context, raw_json, nested}`.
#[derive(Debug, Error)]
#[error("parserError [{id} {method} {route}]: {context}: {source}")]
pub struct ParserError {
    pub id: String,
    pub method: String,
    pub route: String,
    pub context: String,
    pub raw_json: Option<String>,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ParserError {
    pub fn new(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ParserError {
            id: String::new(),
            method: String::new(),
            route: String::new(),
            context: context.into(),
            raw_json: None,
            source: Box::new(source),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_route(mut self, method: impl Into<String>, route: impl Into<String>) -> Self {
        self.method = method.into();
        self.route = route.into();
        self
    }
}

/// Accumulates `ParserError`s encountered while parsing a schema without
/// aborting the parse; never fatal to the run. Analogous to
/// `hashicorp/go-multierror` usage.
#[derive(Debug, Default)]
pub struct MultiError {
    pub errors: Vec<ParserError>,
}

impl MultiError {
    pub fn new() -> Self {
        MultiError::default()
    }

    pub fn push(&mut self, err: ParserError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Logs each accumulated error hierarchically at debug level.
    pub fn log_all(&self) {
        for e in &self.errors {
            log::debug!(
                "parser error: id={} method={} route={} context={}: {}",
                e.id,
                e.method,
                e.route,
                e.context,
                e.source
            );
        }
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} parse error(s)", self.errors.len())
    }
}

impl std::error::Error for MultiError {}
