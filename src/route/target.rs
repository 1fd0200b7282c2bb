//! Per-target address and mutable run state.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use tokio_util::sync::CancellationToken;

use crate::baseline::WildcardResponse;

type HostClient = Client<HttpConnector, Either>;

pub use http_body_util::Either as HttpEither;
type Either = http_body_util::Either<
    http_body_util::Full<Bytes>,
    http_body_util::Empty<Bytes>,
>;

/// The address of an HTTP service.
pub struct Target {
    pub hostname: String,
    pub ip: Option<String>,
    pub port: u16,
    pub tls: bool,
    pub base_path: String,
    pub extra_headers: Vec<(String, String)>,
    pub host_header_override: Option<String>,

    host_header: Mutex<Option<String>>,
    http_client: Mutex<Option<HostClient>>,

    hits: AtomicI64,
    consecutive_non_match: AtomicI64,
    quarantined: AtomicBool,

    /// Accumulated, de-duplicated baseline set; accumulates across base
    /// paths within a scan rather than resetting per base (see DESIGN.md).
    pub baselines: Mutex<Vec<WildcardResponse>>,

    pub cancel: CancellationToken,
}

impl Target {
    pub fn new(
        hostname: String,
        ip: Option<String>,
        port: u16,
        tls: bool,
        base_path: String,
        extra_headers: Vec<(String, String)>,
        host_header_override: Option<String>,
    ) -> Self {
        Target {
            hostname,
            ip,
            port,
            tls,
            base_path,
            extra_headers,
            host_header_override,
            host_header: Mutex::new(None),
            http_client: Mutex::new(None),
            hits: AtomicI64::new(0),
            consecutive_non_match: AtomicI64::new(0),
            quarantined: AtomicBool::new(false),
            baselines: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    /// The dial address: IP if set, else hostname, with the port always
    /// present (used for connecting, distinct from the Host header).
    pub fn dial_host(&self) -> &str {
        self.ip.as_deref().unwrap_or(&self.hostname)
    }

    /// Host header, computed once under a mutex and cached thereafter:
    /// `host:port`, with `:port` omitted for scheme-default ports.
    pub fn host_header(&self) -> String {
        if let Some(over) = &self.host_header_override {
            return over.clone();
        }
        let mut guard = self.host_header.lock().unwrap();
        if let Some(h) = guard.as_ref() {
            return h.clone();
        }
        let is_default_port = (self.tls && self.port == 443) || (!self.tls && self.port == 80);
        let computed = if is_default_port {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        };
        *guard = Some(computed.clone());
        computed
    }

    /// Returns the cached per-target host client, constructing it on first
    /// use. Subsequent calls never rebuild it even if target fields mutate;
    /// later changes to target fields are not expected to take effect.
    pub fn http_client(&self, max_conn_per_host: usize) -> HostClient {
        let mut guard = self.http_client.lock().unwrap();
        if let Some(c) = guard.as_ref() {
            return c.clone();
        }
        let client = Client::builder(hyper_util::rt::TokioExecutor::new())
            .pool_max_idle_per_host(max_conn_per_host)
            .build(HttpConnector::new());
        *guard = Some(client.clone());
        client
    }

    pub fn incr_hits(&self) -> i64 {
        self.hits.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn hits(&self) -> i64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Increments the non-match counter and quarantines the target if it
    /// now exceeds `threshold`. Returns `true` if this call quarantined it.
    pub fn incr_non_match(&self, threshold: i64) -> bool {
        let v = self.consecutive_non_match.fetch_add(1, Ordering::Relaxed) + 1;
        if v > threshold && !self.quarantined.swap(true, Ordering::Relaxed) {
            self.cancel.cancel();
            return true;
        }
        false
    }

    pub fn reset_non_match(&self) {
        self.consecutive_non_match.store(0, Ordering::Relaxed);
    }

    pub fn consecutive_non_match(&self) -> i64 {
        self.consecutive_non_match.load(Ordering::Relaxed)
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined.load(Ordering::Relaxed)
    }

    pub fn quarantine(&self) {
        if !self.quarantined.swap(true, Ordering::Relaxed) {
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new(
            "example.com".into(),
            None,
            80,
            false,
            String::new(),
            vec![],
            None,
        )
    }

    #[test]
    fn default_port_host_header_omits_port() {
        let t = target();
        assert_eq!(t.host_header(), "example.com");
    }

    #[test]
    fn non_default_port_is_kept() {
        let t = Target::new(
            "example.com".into(),
            None,
            8080,
            false,
            String::new(),
            vec![],
            None,
        );
        assert_eq!(t.host_header(), "example.com:8080");
    }

    #[test]
    fn quarantine_fires_cancellation_once() {
        let t = target();
        assert!(!t.incr_non_match(1));
        assert!(t.incr_non_match(1));
        assert!(t.is_cancelled());
        assert!(t.is_quarantined());
    }
}
