//! Command-line surface, enumerated in full as flags on `Scan`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "A concurrent web content-discovery engine: fires parameterised routes \
             derived from OpenAPI-like schemas at a set of targets and filters the \
             noise with per-host baseline (wildcard) detection.",
    long_about = None
)]
pub struct Kitecrawl {
    #[command(subcommand)]
    pub kitecrawl: KitecrawlCmd,
}

#[derive(Subcommand, Debug)]
#[command(infer_subcommands = true)]
pub enum KitecrawlCmd {
    /// Scan a set of targets with a parameterised route set
    Scan(ScanCmd),
    /// Generate shell completions
    GenCompletions {
        /// Set the shell for generating completions
        #[arg(long, short)]
        shell: Shell,

        /// Set the output directory
        #[arg(long, short)]
        out_dir: Option<String>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum FormatType {
    Pretty,
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ScanCmd {
    /// Target host(s) to scan
    ///
    /// A bare host (`example.com`) expands to both `http://example.com:80`
    /// and `https://example.com:443`. An explicit scheme or port narrows the
    /// guess; port 443 or 8443 implies TLS when no scheme is given.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Read additional target specs from a file, one per line
    #[arg(short = 'T', long)]
    pub target_file: Option<PathBuf>,

    /// A plain-text wordlist of routes, one `/`-prefixed path per line
    #[arg(short = 'w', long)]
    pub wordlist: Option<PathBuf>,

    /// Extension(s) appended to each wordlist entry; `%EXT%` in a line is
    /// substituted in place (dirsearch compatibility), otherwise the
    /// extension is appended as `<path>.<ext>`
    #[arg(short = 'x', long = "ext")]
    pub extensions: Vec<String>,

    /// One or more OpenAPI-like JSON schema files describing parameterised
    /// routes
    #[arg(short = 'A', long = "api-spec")]
    pub api_specs: Vec<PathBuf>,

    /// A pre-compiled binary route-set file (see `routeio::encode_binary_routes`)
    #[arg(long)]
    pub routes_binary: Option<PathBuf>,

    /// Restrict the route set to these API source IDs (ksuids)
    #[arg(long = "filter-api")]
    pub filter_apis: Vec<String>,

    /// Render the route set and print it without dispatching any requests
    #[arg(long)]
    pub dry_run: bool,

    /// Cap the route set to the first N routes, preserving API boundaries
    #[arg(long)]
    pub max_routes: Option<usize>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value_t = FormatType::Pretty)]
    pub format: FormatType,

    /// Capture response bodies on accepted results
    #[arg(long)]
    pub read_body: bool,

    /// Capture response headers on accepted results
    #[arg(long)]
    pub read_headers: bool,

    /// Maximum number of targets scanned concurrently
    #[arg(long, default_value_t = 10)]
    pub max_parallel_hosts: usize,

    /// Maximum number of concurrent connections per target host
    #[arg(long, default_value_t = 3)]
    pub max_conn_per_host: usize,

    /// Maximum number of redirects to follow per request
    #[arg(long, default_value_t = 3)]
    pub max_redirects: usize,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 3, value_parser = parse_seconds)]
    pub timeout: u64,

    /// Delay between requests against the same target, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// `User-Agent` header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra header as `Key: Value`, repeatable; later instances override
    /// earlier ones and any per-target header of the same name
    #[arg(short = 'H', long = "header")]
    pub extra_headers: Vec<String>,

    /// Host prefixes that stop a redirect chain instead of being followed
    #[arg(long = "blacklist-redirect")]
    pub blacklist_redirect_domains: Vec<String>,

    /// Content-length range(s) to ignore, as `min-max` or a single value
    #[arg(long = "ignore-length")]
    pub content_length_ignore_ranges: Vec<String>,

    /// Only accept these status codes (empty means no restriction)
    #[arg(long = "success-status")]
    pub success_status_codes: Vec<u16>,

    /// Always reject these status codes
    #[arg(long = "fail-status")]
    pub fail_status_codes: Vec<u16>,

    /// Force every route to use this HTTP method instead of its derived one
    #[arg(long)]
    pub force_method: Option<String>,

    /// Disable per-host baseline (wildcard) detection
    #[arg(long)]
    pub no_wildcard_detection: bool,

    /// Consecutive non-matches before a target is quarantined
    #[arg(long, default_value_t = 10)]
    pub quarantine_threshold: i64,

    /// Number of leading path segments that define a baseline's subpath
    #[arg(long, default_value_t = 1)]
    pub preflight_depth: usize,

    /// Disable preflight baseline probing entirely
    #[arg(long)]
    pub no_preflight: bool,

    /// Disable the two-phase scan (phase one: one route per API; phase two:
    /// only APIs/targets that produced a phase-one hit)
    #[arg(long)]
    pub full_scan: bool,
}

fn parse_seconds(arg: &str) -> Result<u64, std::num::ParseIntError> {
    arg.parse()
}

/// Splits a `Key: Value` or `Key=Value` header spec into its parts.
pub fn parse_header_spec(spec: &str) -> Option<(String, String)> {
    let (key, value) = spec.split_once(':').or_else(|| spec.split_once('='))?;
    Some((key.trim().to_string(), value.trim().to_string()))
}

impl ScanCmd {
    /// Builds the engine's `Config` from this command's flags.
    pub fn to_config(&self) -> crate::config::Config {
        use crate::config::*;
        use crate::route::{Method, Range};

        let mut options: Vec<ConfigOption> = vec![
            with_max_parallel_hosts(self.max_parallel_hosts),
            with_max_conn_per_host(self.max_conn_per_host),
            with_max_redirects(self.max_redirects),
            with_timeout(Duration::from_secs(self.timeout)),
            with_delay(Duration::from_millis(self.delay_ms)),
            with_blacklist_redirect_domains(self.blacklist_redirect_domains.clone()),
            with_success_status_codes(self.success_status_codes.clone()),
            with_fail_status_codes(self.fail_status_codes.clone()),
            with_wildcard_detection(!self.no_wildcard_detection),
            with_quarantine_threshold(self.quarantine_threshold),
            with_preflight_depth(self.preflight_depth),
            with_preflight_enabled(!self.no_preflight),
            with_filter_apis(self.filter_apis.clone()),
            with_full_scan(self.full_scan),
            with_capture(self.read_body, self.read_headers),
        ];

        if let Some(ua) = &self.user_agent {
            options.push(with_user_agent(ua.clone()));
        }

        let headers: Vec<(String, String)> = self
            .extra_headers
            .iter()
            .filter_map(|s| parse_header_spec(s))
            .collect();
        if !headers.is_empty() {
            options.push(with_extra_headers(headers));
        }

        let ranges: Vec<Range> = self
            .content_length_ignore_ranges
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        if !ranges.is_empty() {
            options.push(with_content_length_ignore_ranges(ranges));
        }

        if let Some(m) = &self.force_method {
            if let Some(method) = Method::from_str_coerced(m) {
                options.push(with_force_method(method));
            }
        }

        build(options)
    }

    pub fn output_format(&self) -> crate::result::OutputFormat {
        match self.format {
            FormatType::Pretty => crate::result::OutputFormat::Pretty,
            FormatType::Text => crate::result::OutputFormat::Text,
            FormatType::Json => crate::result::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_spec_splits_on_colon() {
        assert_eq!(
            parse_header_spec("X-Foo: bar"),
            Some(("X-Foo".to_string(), "bar".to_string()))
        );
    }

    #[test]
    fn header_spec_accepts_equals_fallback() {
        assert_eq!(
            parse_header_spec("X-Foo=bar"),
            Some(("X-Foo".to_string(), "bar".to_string()))
        );
    }
}
