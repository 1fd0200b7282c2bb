//! The result record and its human/JSON formatters.

use serde::Serialize;

use crate::route::{Response, Route, Target};

/// `{target, route, response}`, as streamed to the output consumer.
/// Obtained from a pool by the scheduler; released after the caller is
/// done with it.
pub struct ScanResult {
    pub target_label: String,
    pub route: Route,
    pub response: Response,
}

impl ScanResult {
    pub fn new(target: &Target, route: Route, response: Response) -> Self {
        ScanResult {
            target_label: format!("{}://{}", target.scheme(), target.host_header()),
            route,
            response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    method: &'a str,
    status: u16,
    bytes: u64,
    words: u64,
    lines: u64,
    url: String,
    redirect_url: Option<String>,
    source_id: &'a str,
}

/// ANSI color codes for pretty-mode status-code coloring, matching the
/// original's status-bucket scheme (2xx green, 3xx cyan, 4xx yellow, 5xx
/// red).
fn status_color(status: u16) -> &'static str {
    match status / 100 {
        2 => "\x1b[32m",
        3 => "\x1b[36m",
        4 => "\x1b[33m",
        5 => "\x1b[31m",
        _ => "\x1b[0m",
    }
}

const RESET: &str = "\x1b[0m";

/// Renders `METHOD STATUSCODE [bytes,words,lines] URL -> REDIRECT_URL …
/// source_id`.
pub fn format_line(result: &ScanResult, format: OutputFormat) -> String {
    let url = format!("{}{}", result.target_label, result.route.path);
    let final_hop = result
        .response
        .flatten()
        .last()
        .map(|r| (*r).clone())
        .unwrap_or_default();

    match format {
        OutputFormat::Json => {
            let redirect_url = if result.response.chain_len() > 1 {
                Some(final_hop.final_uri.clone())
            } else {
                None
            };
            let record = JsonResult {
                method: result.route.method.as_str(),
                status: final_hop.status_code,
                bytes: final_hop.body_length,
                words: final_hop.words,
                lines: final_hop.lines,
                url,
                redirect_url,
                source_id: &result.route.source_id,
            };
            serde_json::to_string(&record).unwrap_or_default()
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            let mut out = String::new();
            if format == OutputFormat::Pretty {
                out.push_str(status_color(final_hop.status_code));
            }
            out.push_str(&format!(
                "{:<6} {:>3} [{},{},{}] {}",
                result.route.method,
                final_hop.status_code,
                final_hop.body_length,
                final_hop.words,
                final_hop.lines,
                url
            ));
            if format == OutputFormat::Pretty {
                out.push_str(RESET);
            }
            if result.response.chain_len() > 1 {
                out.push_str(&format!(" -> {}", final_hop.final_uri));
            }
            out.push(' ');
            out.push_str(&result.route.source_id);
            out
        }
    }
}

/// Dispatches a result to the log sink in the configured
/// pretty/text/json mode.
pub fn log_result(result: &ScanResult, format: OutputFormat) {
    println!("{}", format_line(result, format));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Header, Method};

    fn route() -> Route {
        Route {
            method: Method::Get,
            path: "/admin".to_string(),
            query: String::new(),
            headers: Vec::<Header>::new(),
            body: Vec::new(),
            source_id: "src1".to_string(),
        }
    }

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
    fn text_line_contains_method_status_and_source() {
        let route = route();
        let target = target();
        let response = Response {
            status_code: 200,
            body_length: 10,
            words: 2,
            lines: 1,
            ..Default::default()
        };
        let result = ScanResult::new(&target, route, response);
        let line = format_line(&result, OutputFormat::Text);
        assert!(line.contains("GET"));
        assert!(line.contains("200"));
        assert!(line.ends_with("src1"));
    }

    #[test]
    fn json_line_is_valid_json() {
        let route = route();
        let target = target();
        let response = Response {
            status_code: 404,
            ..Default::default()
        };
        let result = ScanResult::new(&target, route, response);
        let line = format_line(&result, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["status"], 404);
    }
}
