//! Route-source loaders: plain text, JSON schema, and the
//! compiled binary format. A minimal implementation of each format is
//! needed to exercise the engine end to end.

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::MultiError;
use crate::proute::Api;
use crate::route::{Method, Route};
use crate::schema::ApiSchema;

/// Loads a plain-text wordlist, one path per line, prefixing a leading `/`
/// on load. If `extensions` is non-empty, each line becomes one route per
/// extension: `%EXT%` is substituted verbatim (dirsearch compatibility) when
/// present, otherwise the extension is appended as `<path>.<ext>`.
pub fn load_text_routes(
    reader: impl BufRead,
    extensions: &[String],
    source_id: &str,
) -> std::io::Result<Vec<Route>> {
    let mut routes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let path = if line.starts_with('/') {
            line.to_string()
        } else {
            format!("/{line}")
        };

        if extensions.is_empty() {
            routes.push(text_route(path, source_id));
            continue;
        }
        for ext in extensions {
            let rendered = if path.contains("%EXT%") {
                path.replace("%EXT%", ext)
            } else {
                format!("{path}.{ext}")
            };
            routes.push(text_route(rendered, source_id));
        }
    }
    Ok(routes)
}

fn text_route(path: String, source_id: &str) -> Route {
    Route {
        method: Method::Get,
        path,
        query: String::new(),
        headers: Vec::new(),
        body: Vec::new(),
        source_id: source_id.to_string(),
    }
}

/// Parses a JSON OpenAPI-like schema document into an `Api`. Malformed
/// entries surface through the returned `MultiError`; a structurally
/// unreadable top-level document is the only hard failure.
pub fn load_json_api(body: &str) -> Result<(Api, MultiError), serde_json::Error> {
    let schema: ApiSchema = serde_json::from_str(body)?;
    let mut errors = MultiError::new();
    let api = Api::from_schema(&schema, &mut errors);
    Ok((api, errors))
}

/// A route-set as serialised to the compiled binary format: a
/// length-prefixed record stream is `bincode`'s native encoding already, so
/// this wraps a plain `Vec<BinaryRoute>` as a bincode-based compiled route
/// format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRoute {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source_id: String,
}

impl From<&Route> for BinaryRoute {
    fn from(r: &Route) -> Self {
        BinaryRoute {
            method: r.method.to_string(),
            path: r.path.clone(),
            query: r.query.clone(),
            headers: r.headers.iter().map(|h| (h.key.clone(), h.value.clone())).collect(),
            body: r.body.clone(),
            source_id: r.source_id.clone(),
        }
    }
}

impl BinaryRoute {
    pub fn into_route(self) -> Option<Route> {
        let method = Method::from_str_coerced(&self.method)?;
        Some(Route {
            method,
            path: self.path,
            query: self.query,
            headers: self
                .headers
                .into_iter()
                .map(|(k, v)| crate::route::Header::new(k, v))
                .collect(),
            body: self.body,
            source_id: self.source_id,
        })
    }
}

pub fn encode_binary_routes(routes: &[Route]) -> bincode::Result<Vec<u8>> {
    let records: Vec<BinaryRoute> = routes.iter().map(BinaryRoute::from).collect();
    bincode::serialize(&records)
}

pub fn decode_binary_routes(bytes: &[u8]) -> bincode::Result<Vec<Route>> {
    let records: Vec<BinaryRoute> = bincode::deserialize(bytes)?;
    Ok(records.into_iter().filter_map(BinaryRoute::into_route).collect())
}

pub fn load_binary_file(path: &Path) -> std::io::Result<Vec<Route>> {
    let bytes = std::fs::read(path)?;
    decode_binary_routes(&bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn text_routes_get_leading_slash() {
        let routes = load_text_routes(Cursor::new("admin\n/login\n"), &[], "src").unwrap();
        assert_eq!(routes[0].path, "/admin");
        assert_eq!(routes[1].path, "/login");
    }

    #[test]
    fn ext_placeholder_is_substituted_dirsearch_style() {
        let routes = load_text_routes(
            Cursor::new("/api/%EXT%\n"),
            &["json".to_string(), "xml".to_string()],
            "src",
        )
        .unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/api/json");
        assert_eq!(routes[1].path, "/api/xml");
    }

    #[test]
    fn extension_without_placeholder_is_appended() {
        let routes =
            load_text_routes(Cursor::new("/admin\n"), &["bak".to_string()], "src").unwrap();
        assert_eq!(routes[0].path, "/admin.bak");
    }

    #[test]
    fn binary_round_trip_preserves_routes() {
        let routes = vec![text_route("/a".into(), "s"), text_route("/b".into(), "s")];
        let encoded = encode_binary_routes(&routes).unwrap();
        let decoded = decode_binary_routes(&encoded).unwrap();
        assert_eq!(decoded.len(), routes.len());
        assert_eq!(decoded[0].path, "/a");
        assert_eq!(decoded[1].path, "/b");
    }
}
