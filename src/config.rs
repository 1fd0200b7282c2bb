//! Run configuration: the scan scheduler's external surface,
//! built with functional options the way `kiterunner/config.go` does.

use std::time::Duration;

use crate::errors::ConfigError;
use crate::route::{Method, Range};

#[derive(Debug, Clone)]
pub struct Config {
    pub max_parallel_hosts: usize,
    pub max_conn_per_host: usize,
    pub max_redirects: usize,
    pub timeout: Duration,
    pub delay: Duration,
    pub user_agent: String,
    pub extra_headers: Vec<(String, String)>,
    pub blacklist_redirect_domains: Vec<String>,
    pub content_length_ignore_ranges: Vec<Range>,
    pub success_status_codes: Vec<u16>,
    pub fail_status_codes: Vec<u16>,
    pub force_method: Option<Method>,
    pub wildcard_detection: bool,
    pub quarantine_threshold: i64,
    pub preflight_depth: usize,
    pub preflight_enabled: bool,
    pub filter_apis: Vec<String>,
    pub full_scan: bool,
    pub read_body: bool,
    pub read_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_parallel_hosts: 10,
            max_conn_per_host: 3,
            max_redirects: 3,
            timeout: Duration::from_secs(3),
            delay: Duration::ZERO,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            extra_headers: Vec::new(),
            blacklist_redirect_domains: Vec::new(),
            content_length_ignore_ranges: Vec::new(),
            success_status_codes: Vec::new(),
            fail_status_codes: Vec::new(),
            force_method: None,
            wildcard_detection: true,
            quarantine_threshold: 10,
            preflight_depth: 1,
            preflight_enabled: true,
            filter_apis: Vec::new(),
            full_scan: true,
            read_body: false,
            read_headers: false,
        }
    }
}

impl Config {
    /// `max_*` fields must be `>= 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut bad = Vec::new();
        if self.max_parallel_hosts < 1 {
            bad.push("max_parallel_hosts".to_string());
        }
        if self.max_conn_per_host < 1 {
            bad.push("max_conn_per_host".to_string());
        }
        if self.max_redirects < 1 {
            bad.push("max_redirects".to_string());
        }
        if bad.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { fields: bad })
        }
    }
}

/// A functional builder option, applied in order over a default `Config`
/// (mirrors `kiterunner/config.go`'s `ConfigOption` pattern).
pub type ConfigOption = Box<dyn FnOnce(&mut Config)>;

pub fn build(options: Vec<ConfigOption>) -> Config {
    let mut config = Config::default();
    for opt in options {
        opt(config_mut(&mut config));
    }
    config
}

fn config_mut(c: &mut Config) -> &mut Config {
    c
}

pub fn with_max_parallel_hosts(n: usize) -> ConfigOption {
    Box::new(move |c| c.max_parallel_hosts = n)
}

pub fn with_max_conn_per_host(n: usize) -> ConfigOption {
    Box::new(move |c| c.max_conn_per_host = n)
}

pub fn with_max_redirects(n: usize) -> ConfigOption {
    Box::new(move |c| c.max_redirects = n)
}

pub fn with_timeout(d: Duration) -> ConfigOption {
    Box::new(move |c| c.timeout = d)
}

pub fn with_delay(d: Duration) -> ConfigOption {
    Box::new(move |c| c.delay = d)
}

pub fn with_user_agent(ua: String) -> ConfigOption {
    Box::new(move |c| c.user_agent = ua)
}

pub fn with_extra_headers(headers: Vec<(String, String)>) -> ConfigOption {
    Box::new(move |c| c.extra_headers = headers)
}

pub fn with_blacklist_redirect_domains(domains: Vec<String>) -> ConfigOption {
    Box::new(move |c| c.blacklist_redirect_domains = domains)
}

pub fn with_content_length_ignore_ranges(ranges: Vec<Range>) -> ConfigOption {
    Box::new(move |c| c.content_length_ignore_ranges = ranges)
}

pub fn with_success_status_codes(codes: Vec<u16>) -> ConfigOption {
    Box::new(move |c| c.success_status_codes = codes)
}

pub fn with_fail_status_codes(codes: Vec<u16>) -> ConfigOption {
    Box::new(move |c| c.fail_status_codes = codes)
}

pub fn with_force_method(method: Method) -> ConfigOption {
    Box::new(move |c| c.force_method = Some(method))
}

pub fn with_wildcard_detection(enabled: bool) -> ConfigOption {
    Box::new(move |c| c.wildcard_detection = enabled)
}

pub fn with_quarantine_threshold(n: i64) -> ConfigOption {
    Box::new(move |c| c.quarantine_threshold = n)
}

pub fn with_preflight_depth(n: usize) -> ConfigOption {
    Box::new(move |c| c.preflight_depth = n)
}

pub fn with_preflight_enabled(enabled: bool) -> ConfigOption {
    Box::new(move |c| c.preflight_enabled = enabled)
}

pub fn with_filter_apis(apis: Vec<String>) -> ConfigOption {
    Box::new(move |c| c.filter_apis = apis)
}

pub fn with_full_scan(enabled: bool) -> ConfigOption {
    Box::new(move |c| c.full_scan = enabled)
}

pub fn with_capture(read_body: bool, read_headers: bool) -> ConfigOption {
    Box::new(move |c| {
        c.read_body = read_body;
        c.read_headers = read_headers;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_max_parallel_hosts_is_rejected() {
        let config = build(vec![with_max_parallel_hosts(0)]);
        let err = config.validate().unwrap_err();
        assert!(err.fields.contains(&"max_parallel_hosts".to_string()));
    }

    #[test]
    fn options_apply_in_order() {
        let config = build(vec![
            with_max_parallel_hosts(5),
            with_max_parallel_hosts(20),
        ]);
        assert_eq!(config.max_parallel_hosts, 20);
    }
}
