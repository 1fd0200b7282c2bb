//! The parameterised proute IR: an API's routes as template paths plus
//! per-location crumb trees, with cached rendering and conversion to the
//! concrete `route::Route` the engine dispatches.

use std::collections::BTreeMap;

use crate::crumb::{Crumb, CrumbOptions};
use crate::errors::MultiError;
use crate::route::{get_depth, Header, Method, Route};
use crate::schema::{
    schema_to_crumb, security_definition_to_crumb, ApiSchema, Operation, Parameter,
};

/// One parameterised route: a template path plus the crumb trees that render
/// its query, headers, and body.
#[derive(Debug, Clone)]
pub struct PRoute {
    pub template_path: String,
    pub method: String,
    pub path_crumbs: Vec<Crumb>,
    pub query_crumbs: Vec<Crumb>,
    pub header_crumbs: Vec<Crumb>,
    pub body_crumb: Option<Crumb>,
    /// `consumes[]` from the operation; the first non-empty value becomes
    /// `Content-Type`.
    pub content_types: Vec<String>,
    pub source_id: String,
}

impl PRoute {
    /// Substitutes `{name}` placeholders in the template path using
    /// `path_crumbs`' rendered values, defaulting unmatched tags to the
    /// literal `"42"`.
    pub fn render_path(&self) -> String {
        let values: BTreeMap<&str, String> = self
            .path_crumbs
            .iter()
            .map(|c| (c.key(), c.scalar_value()))
            .collect();
        substitute_tags(&self.template_path, &values)
    }

    /// URL-encoded, `&`-joined query string, built from `query_crumbs`
    /// sorted by key by the encoding routine.
    pub fn render_query(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .query_crumbs
            .iter()
            .map(|c| (c.key().to_string(), c.scalar_value()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            ser.append_pair(k, v);
        }
        ser.finish()
    }

    /// Headers in declaration order, with `Content-Type` appended only when
    /// the body is non-empty or the method is non-`GET`.
    pub fn render_headers(&self, body: &[u8], method: Method) -> Vec<Header> {
        let mut headers: Vec<Header> = self
            .header_crumbs
            .iter()
            .map(|c| Header::new(c.key().to_string(), c.scalar_value()))
            .collect();

        if !body.is_empty() || method != Method::Get {
            if let Some(ct) = self.content_types.iter().find(|c| !c.is_empty()) {
                let mut value = ct.clone();
                if ct == "multipart/form-data" {
                    value = format!(
                        "{ct}; boundary={}",
                        crate::crumb::DEFAULT_FORM_DATA_BOUNDARY
                    );
                }
                headers.push(Header::new("Content-Type", value));
            }
        }
        headers
    }

    pub fn render_body(&self) -> Vec<u8> {
        let Some(body_crumb) = &self.body_crumb else {
            return Vec::new();
        };
        let content_type = self
            .content_types
            .iter()
            .find(|c| !c.is_empty())
            .map(|s| s.as_str())
            .unwrap_or("application/json");
        let opts = CrumbOptions::root(content_type_for(content_type));
        body_crumb.value(&opts).into_bytes()
    }

    /// Converts to a concrete, immutable `Route`. Returns `None` for
    /// `HEAD/OPTIONS/CONNECT/TRACE`; unknown verbs coerce to GET.
    pub fn to_route(&self) -> Option<Route> {
        let method = Method::from_str_coerced(&self.method)?;
        let body = self.render_body();
        let path = self.render_path();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Some(Route {
            method,
            headers: self.render_headers(&body, method),
            query: self.render_query(),
            body,
            path,
            source_id: self.source_id.clone(),
        })
    }
}

fn content_type_for(mime: &str) -> crate::crumb::ContentType {
    if mime.contains("xml") {
        crate::crumb::ContentType::Xml
    } else if mime.contains("multipart") {
        crate::crumb::ContentType::FormData
    } else if mime.contains("json") {
        crate::crumb::ContentType::Json
    } else {
        crate::crumb::ContentType::FormEncoded
    }
}

/// `{name}` substitution defaulting to `"42"`, matching the original's
/// fasttemplate usage.
fn substitute_tags(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let name = &template[i + 1..i + end];
                let value = values.get(name).cloned().unwrap_or_else(|| "42".to_string());
                out.push_str(&value);
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars;
    out
}

/// An API source: a set of parameterised routes derived from one schema
/// document, plus the `ksuid`-style source ID tagging them.
#[derive(Debug, Clone)]
pub struct Api {
    pub id: String,
    pub url: String,
    pub routes: Vec<PRoute>,
}

impl Api {
    /// Builds an `Api` from a parsed JSON schema document, accumulating any
    /// malformed parameter/schema failures into `errors` rather than
    /// aborting.
    pub fn from_schema(schema: &ApiSchema, errors: &mut MultiError) -> Api {
        let id = schema
            .ksuid
            .clone()
            .unwrap_or_else(|| svix_ksuid::Ksuid::new(None, None).to_string());

        let mut routes = Vec::new();
        for (path, ops) in &schema.paths {
            for op in ops {
                if let Some(route) = build_proute(path, op, schema, &id, errors) {
                    routes.push(route);
                }
            }
        }
        Api {
            id,
            url: schema.url.clone(),
            routes,
        }
    }

    pub fn to_routes(&self) -> Vec<Route> {
        self.routes.iter().filter_map(PRoute::to_route).collect()
    }
}

fn build_proute(
    path: &str,
    op: &Operation,
    schema: &ApiSchema,
    source_id: &str,
    errors: &mut MultiError,
) -> Option<PRoute> {
    let mut path_crumbs = Vec::new();
    let mut query_crumbs = Vec::new();
    let mut header_crumbs = Vec::new();
    let mut body_elements = Vec::new();

    for param in &op.parameters {
        let crumb = param_to_crumb(param, errors);
        match param.location.as_deref() {
            Some("path") => path_crumbs.push(crumb),
            Some("query") => query_crumbs.push(crumb),
            Some("header") => header_crumbs.push(crumb),
            Some("cookie") => header_crumbs.push(rename_crumb(crumb, "Cookie")),
            _ => body_elements.push(crumb),
        }
    }

    for (name, def) in &schema.security_definitions {
        if let Some(crumb) = security_definition_to_crumb(name, def) {
            match def.location.as_deref() {
                Some("query") => query_crumbs.push(crumb),
                Some("header") => header_crumbs.push(crumb),
                _ => header_crumbs.push(crumb),
            }
        }
    }

    let body_crumb = if body_elements.is_empty() {
        None
    } else {
        Some(Crumb::Object {
            name: "body".to_string(),
            elements: body_elements,
        })
    };

    Some(PRoute {
        template_path: path.to_string(),
        method: op.method.clone(),
        path_crumbs,
        query_crumbs,
        header_crumbs,
        body_crumb,
        content_types: op.consumes.clone(),
        source_id: source_id.to_string(),
    })
}

fn param_to_crumb(param: &Parameter, errors: &mut MultiError) -> Crumb {
    if let Some(nested) = &param.schema_ref {
        return schema_to_crumb(&param.name, nested, errors);
    }
    schema_to_crumb(&param.name, &param.schema, errors)
}

fn rename_crumb(crumb: Crumb, new_name: &str) -> Crumb {
    match crumb {
        Crumb::Static { value, .. } => Crumb::Static {
            name: new_name.to_string(),
            value,
        },
        other => Crumb::StringWrapped {
            name: new_name.to_string(),
            child: Box::new(other),
        },
    }
}

/// Renders a textual listing of an API's routes without dispatching any of
/// them (the `--dry-run` print mode carried from `original_source/`).
pub fn debug_print(api: &Api) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {} ({})\n", api.url, api.id));
    for r in &api.routes {
        out.push_str(&format!("{:<7} {}\n", r.method, r.template_path));
    }
    out
}

/// All routes across a set of APIs, filtered to `source_ids` when non-empty.
pub fn routes_for(apis: &[Api], source_ids: &[String]) -> Vec<Route> {
    apis.iter()
        .filter(|a| source_ids.is_empty() || source_ids.contains(&a.id))
        .flat_map(Api::to_routes)
        .collect()
}

/// Truncates a route set to the first `n` routes across APIs, preserving API
/// boundaries.
pub fn first(apis: &[Api], n: usize) -> Vec<Route> {
    let mut out = Vec::new();
    for api in apis {
        for route in api.to_routes() {
            if out.len() >= n {
                return out;
            }
            out.push(route);
        }
    }
    out
}

/// The first route of each API: phase one sends one route per API source.
pub fn one_per_route_source(apis: &[Api]) -> Vec<Route> {
    apis.iter()
        .filter_map(|api| api.routes.iter().find_map(PRoute::to_route))
        .collect()
}

/// Collapses every route's base path for a `preflight_depth`, used by
/// callers building a `RouteMap` directly from an API set.
pub fn base_paths(routes: &[Route], preflight_depth: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for r in routes {
        let b = get_depth(&r.path, preflight_depth);
        if !seen.contains(&b) {
            seen.push(b);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_tag_and_defaults_unknown() {
        let mut values = BTreeMap::new();
        values.insert("id", "7".to_string());
        assert_eq!(substitute_tags("/users/{id}/{extra}", &values), "/users/7/42");
    }

    #[test]
    fn from_schema_builds_one_route_per_operation() {
        let json = r#"{
            "url": "http://example.com",
            "paths": {
                "/users/{id}": [
                    {"method": "GET", "parameters": [{"name": "id", "in": "path", "type": "integer"}]}
                ]
            }
        }"#;
        let schema: ApiSchema = serde_json::from_str(json).unwrap();
        let mut errors = MultiError::new();
        let api = Api::from_schema(&schema, &mut errors);
        assert_eq!(api.routes.len(), 1);
        let route = api.routes[0].to_route().unwrap();
        assert!(route.path.starts_with("/users/"));
    }
}
