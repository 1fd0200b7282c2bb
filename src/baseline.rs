//! Per-subpath baseline ("wildcard") fingerprinting.

use crate::crumb::random::{random_string, random_two_segment_path, Charset};
use crate::crumb::basic_auth_token;
use crate::route::{Header, Method, Route};

/// A baseline fingerprint computed from a preflight probe's response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WildcardResponse {
    pub status_code: u16,
    pub content_length: u64,
    pub adjusted_content_length: u64,
    pub adjustment_scale: u64,
    pub word_count: u64,
    pub line_count: u64,
}

impl WildcardResponse {
    /// Computes a fingerprint from a raw probe response body, adjusting for
    /// occurrences of `request_path` in the body.
    ///
    /// # Panics
    /// Panics if `(content_length - adjusted_content_length)` is not evenly
    /// divisible by `request_path`'s byte length — this is treated as fatal,
    /// a detector bug rather than a silently mis-filtered baseline (an open
    /// question resolved in DESIGN.md).
    pub fn compute(status_code: u16, body: &[u8], words: u64, lines: u64, request_path: &str) -> Self {
        let content_length = body.len() as u64;
        let path_bytes = request_path.as_bytes();

        if path_bytes.is_empty() {
            return WildcardResponse {
                status_code,
                content_length,
                adjusted_content_length: content_length,
                adjustment_scale: 0,
                word_count: words,
                line_count: lines,
            };
        }

        let adjusted_body = remove_all_occurrences(body, path_bytes);
        let adjusted_content_length = adjusted_body.len() as u64;
        let diff = content_length.saturating_sub(adjusted_content_length);
        let path_len = path_bytes.len() as u64;

        assert!(
            diff % path_len == 0,
            "wildcard adjustment not evenly divisible by path length: diff={diff} path_len={path_len}"
        );

        WildcardResponse {
            status_code,
            content_length,
            adjusted_content_length,
            adjustment_scale: diff / path_len,
            word_count: words,
            line_count: lines,
        }
    }
}

fn remove_all_occurrences(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// A de-duplicated set of baselines accumulated for a target.
/// Accumulates across base paths within a scan rather than resetting per
/// base — preserved deliberately, see DESIGN.md.
#[derive(Debug, Default, Clone)]
pub struct WildcardResponses {
    inner: Vec<WildcardResponse>,
}

impl WildcardResponses {
    pub fn push_unique(&mut self, r: WildcardResponse) {
        if !self.inner.contains(&r) {
            self.inner.push(r);
        }
    }

    pub fn merge(&mut self, other: &WildcardResponses) {
        for r in &other.inner {
            self.push_unique(*r);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &WildcardResponse> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Builds the fixed set of preflight probes for one base path:
/// a nested random two-segment `GET`, `GET /`, a stress-length `GET`, a
/// `POST /`, a basic-auth `PUT`/`GET`, and one random-segment probe for each
/// of `GET/PUT/POST/DELETE/PATCH`.
pub fn preflight_check_routes(base: &str, source_id: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    let push = |routes: &mut Vec<Route>, method: Method, path: String, headers: Vec<Header>| {
        routes.push(Route {
            method,
            path: format!("{base}{path}"),
            query: String::new(),
            headers,
            body: Vec::new(),
            source_id: source_id.to_string(),
        });
    };

    push(&mut routes, Method::Get, random_two_segment_path(), vec![]);
    push(&mut routes, Method::Get, "/".to_string(), vec![]);
    push(
        &mut routes,
        Method::Get,
        format!("/{}", "A".repeat(1500)),
        vec![],
    );
    push(&mut routes, Method::Post, "/".to_string(), vec![]);

    let auth_path = format!("/auth{}", random_string(Charset::Alpha, 6));
    let auth_header = vec![Header::new(
        "Authorization",
        format!("Basic {}", basic_auth_token()),
    )];
    push(&mut routes, Method::Put, auth_path.clone(), auth_header.clone());
    push(&mut routes, Method::Get, auth_path, auth_header);

    for method in [Method::Get, Method::Put, Method::Post, Method::Delete, Method::Patch] {
        push(
            &mut routes,
            method,
            format!("/{}", random_string(Charset::Alpha, 8)),
            vec![],
        );
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_scale_counts_path_occurrences() {
        let body = b"<h1>path: /admin</h1>";
        let wr = WildcardResponse::compute(404, body, 3, 1, "/admin");
        assert_eq!(wr.adjustment_scale, 1);
        assert_eq!(wr.adjusted_content_length, (body.len() - "/admin".len()) as u64);
    }

    #[test]
    fn divisibility_invariant_holds_for_repeated_occurrences() {
        let body = b"x/foo y/foo z/foo";
        let wr = WildcardResponse::compute(200, body, 3, 1, "/foo");
        let diff = wr.content_length - wr.adjusted_content_length;
        assert_eq!(diff % "/foo".len() as u64, 0);
        assert_eq!(wr.adjustment_scale, 3);
    }

    #[test]
    fn no_occurrence_yields_zero_scale() {
        let body = b"not found";
        let wr = WildcardResponse::compute(200, body, 2, 1, "/admin");
        assert_eq!(wr.adjustment_scale, 0);
        assert_eq!(wr.adjusted_content_length, wr.content_length);
    }

    #[test]
    fn preflight_probes_cover_every_required_case() {
        let routes = preflight_check_routes("/api", "src");
        // nested-random GET, GET /, stress-length GET, POST /, basic-auth
        // PUT+GET, and one random-segment probe per of GET/PUT/POST/DELETE/PATCH.
        assert_eq!(routes.len(), 11);
        assert!(routes.iter().any(|r| r.path == "/api/"));
        assert!(routes.iter().any(|r| r.path == format!("/api/{}", "A".repeat(1500))));
        assert_eq!(
            routes
                .iter()
                .filter(|r| r.headers.iter().any(|h| h.key == "Authorization"))
                .count(),
            2
        );
        // One random-segment probe per method: GET x5 (nested, /, stress,
        // auth, loop), POST x2 (/ and loop), PUT x2 (auth and loop), DELETE
        // x1, PATCH x1.
        let count = |m: Method| routes.iter().filter(|r| r.method == m).count();
        assert_eq!(count(Method::Get), 5);
        assert_eq!(count(Method::Post), 2);
        assert_eq!(count(Method::Put), 2);
        assert_eq!(count(Method::Delete), 1);
        assert_eq!(count(Method::Patch), 1);
    }
}
