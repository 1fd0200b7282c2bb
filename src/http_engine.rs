//! The per-target HTTP engine: request construction, dispatch, and redirect
//! following.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Either, Empty, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;

use crate::errors::RedirectError;
use crate::route::{Header, Method, Request, Response, Route, Target};

type Body = Either<Full<Bytes>, Empty<Bytes>>;
type GenericClient = Client<HttpConnector, Body>;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Config values consumed by the engine (a subset of `config::Config`).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub max_redirects: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub extra_headers: Vec<(String, String)>,
    pub blacklist_redirect_prefixes: Vec<String>,
    pub read_body: bool,
    pub read_headers: bool,
}

fn build_request(
    target: &Target,
    route: &Route,
    opts: &EngineOptions,
) -> http::Result<http::Request<Body>> {
    let path = format!("{}{}", target.base_path, route.path);
    let uri = if route.query.is_empty() {
        format!("{}://{}{}", target.scheme(), target.host_header(), path)
    } else {
        format!(
            "{}://{}{}?{}",
            target.scheme(),
            target.host_header(),
            path,
            route.query
        )
    };
    build_request_for_uri(&uri, route.method, &route.headers, &route.body, target, opts)
}

fn build_request_for_uri(
    uri: &str,
    method: Method,
    route_headers: &[Header],
    body: &[u8],
    target: &Target,
    opts: &EngineOptions,
) -> http::Result<http::Request<Body>> {
    let mut builder = http::Request::builder().method(method.to_http()).uri(uri);

    builder = builder.header("Host", target.host_header());
    builder = builder.header("User-Agent", opts.user_agent.as_str());
    for (k, v) in &target.extra_headers {
        builder = builder.header(k.as_str(), v.as_str());
    }
    for h in route_headers {
        builder = builder.header(h.key.as_str(), h.value.as_str());
    }
    // Global extra headers override per-target and per-route ones; later
    // overrides earlier.
    for (k, v) in &opts.extra_headers {
        builder = builder.header(k.as_str(), v.as_str());
    }

    let body = if body.is_empty() {
        Body::right(Empty::new())
    } else {
        Body::left(Full::new(Bytes::copy_from_slice(body)))
    };
    builder.body(body)
}

/// Dispatches a single `(target, route)` request and follows redirects up to
/// `opts.max_redirects`, returning the head of the response chain.
/// `generic_client` is used once the chain switches scheme/host away
/// from the target's own pooled client; the switch is one-way.
pub async fn do_client(
    request: &Request<'_>,
    opts: &EngineOptions,
    max_conn_per_host: usize,
    generic_client: &GenericClient,
) -> Response {
    let target = &request.target;
    let route = request.route;

    let initial = match build_request(target, route, opts) {
        Ok(r) => r,
        Err(e) => {
            return Response {
                error: None,
                status_code: 0,
                final_uri: String::new(),
                ..err_response(&e.to_string())
            }
        }
    };

    let mut current_uri = format!(
        "{}://{}{}",
        target.scheme(),
        target.host_header(),
        request.full_path()
    );
    let mut using_target_client = true;
    let mut req = initial;
    let mut hops_left = opts.max_redirects;
    let mut hops: Vec<Response> = Vec::new();

    loop {
        let target_client = target.http_client(max_conn_per_host);
        let result = if using_target_client {
            tokio::time::timeout(opts.timeout, target_client.request(req)).await
        } else {
            tokio::time::timeout(opts.timeout, generic_client.request(req)).await
        };

        let response = match result {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                hops.push(err_response(&e.to_string()));
                break;
            }
            Err(_) => {
                hops.push(err_response("request timed out"));
                break;
            }
        };

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(http::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let headers_snapshot: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body_bytes = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                hops.push(err_response(&e.to_string()));
                break;
            }
        };
        let (words, lines) = Response::count_words_lines(&body_bytes);

        let is_first_hop = hops.is_empty();
        let mut resp = Response {
            status_code: status,
            body_length: body_bytes.len() as u64,
            words,
            lines,
            headers: if opts.read_headers {
                Some(headers_snapshot.clone())
            } else {
                None
            },
            body: if opts.read_body {
                Some(body_bytes.to_vec())
            } else {
                None
            },
            final_uri: if is_first_hop {
                String::new()
            } else {
                current_uri.clone()
            },
            redirect: None,
            error: None,
        };

        let is_redirect = REDIRECT_STATUSES.contains(&status);
        if !is_redirect {
            hops.push(resp);
            break;
        }
        if hops_left == 0 {
            resp.error = Some(RedirectError::TooManyRedirects);
            hops.push(resp);
            break;
        }

        let Some(location) = location else {
            resp.error = Some(RedirectError::MissingLocation);
            hops.push(resp);
            break;
        };

        let next_uri = resolve_location(&current_uri, &location);
        if blacklisted(&next_uri, &opts.blacklist_redirect_prefixes) {
            hops.push(resp);
            break;
        }

        hops.push(resp);
        hops_left -= 1;

        let next_uri_parsed: http::Uri = match next_uri.parse() {
            Ok(u) => u,
            Err(_) => break,
        };
        let current_parsed: http::Uri = current_uri.parse().unwrap_or_else(|_| next_uri_parsed.clone());
        if next_uri_parsed.scheme_str() != current_parsed.scheme_str()
            || next_uri_parsed.host() != current_parsed.host()
        {
            using_target_client = false;
        }

        req = match build_request_for_uri(&next_uri, route.method, &[], &[], target, opts) {
            Ok(r) => r,
            Err(_) => break,
        };
        current_uri = next_uri;
    }

    chain_from_hops(hops).unwrap_or_else(|| err_response("no response produced"))
}

/// Folds a flat sequence of hops (in request order) into the owning linked
/// chain the rest of the engine expects: each hop of a redirect chain owns
/// its successor.
fn chain_from_hops(hops: Vec<Response>) -> Option<Response> {
    let mut chain: Option<Box<Response>> = None;
    for mut r in hops.into_iter().rev() {
        r.redirect = chain.take();
        chain = Some(Box::new(r));
    }
    chain.map(|b| *b)
}

fn err_response(msg: &str) -> Response {
    log::debug!("transient http failure: {msg}");
    Response {
        status_code: 0,
        body_length: 0,
        words: 0,
        lines: 0,
        headers: None,
        body: None,
        final_uri: String::new(),
        redirect: None,
        error: None,
    }
}

/// Resolves a `Location` header against the current URI. Absolute locations
/// are used verbatim; relative ones rebase on the current path.
fn resolve_location(current: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    let Ok(parsed) = current.parse::<http::Uri>() else {
        return location.to_string();
    };
    let scheme = parsed.scheme_str().unwrap_or("http");
    let authority = parsed
        .authority()
        .map(|a| a.as_str())
        .unwrap_or_default();
    if let Some(rest) = location.strip_prefix('/') {
        format!("{scheme}://{authority}/{rest}")
    } else {
        let base_path = parsed.path();
        let dir = base_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        format!("{scheme}://{authority}{dir}/{location}")
    }
}

fn blacklisted(uri: &str, prefixes: &[String]) -> bool {
    let Ok(parsed) = uri.parse::<http::Uri>() else {
        return false;
    };
    let host = parsed.host().unwrap_or_default();
    prefixes.iter().any(|p| host.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_location_rebases_on_current_path() {
        let resolved = resolve_location("http://example.com/a/b", "c");
        assert_eq!(resolved, "http://example.com/a/c");
    }

    #[test]
    fn rooted_location_replaces_path() {
        let resolved = resolve_location("http://example.com/a/b", "/c");
        assert_eq!(resolved, "http://example.com/c");
    }

    #[test]
    fn absolute_location_is_used_verbatim() {
        let resolved = resolve_location("http://example.com/a", "https://okta.com/");
        assert_eq!(resolved, "https://okta.com/");
    }

    #[test]
    fn blacklist_matches_prefix() {
        assert!(blacklisted("https://okta.com/", &["okta.com".to_string()]));
        assert!(!blacklisted("https://example.com/", &["okta.com".to_string()]));
    }
}
