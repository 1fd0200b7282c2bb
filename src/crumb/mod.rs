//! The parameterised-route IR: a recursive, content-type-polymorphic value
//! generator that renders schema-derived parameters into concrete wire
//! fragments.

pub mod random;
pub mod render;

use chrono::Utc;
use serde_json::Value as Json;

use base64::Engine;

use crate::crumb::random::{random_api_key, random_from_regex, random_string, Charset};

/// Which wire format a crumb is being rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Xml,
    FormEncoded,
    FormData,
}

/// Fixed multipart boundary, kept identical across runs so captured traffic
/// is recognisable.
pub const DEFAULT_FORM_DATA_BOUNDARY: &str = "hahahahahformboundaryhahahaha";

/// Threaded through every recursive render call.
#[derive(Debug, Clone)]
pub struct CrumbOptions {
    pub content_type: ContentType,
    pub multipart_boundary: String,
    /// `false` only for the root of a render call; controls XML processing
    /// instruction emission.
    pub is_child: bool,
}

impl CrumbOptions {
    pub fn root(content_type: ContentType) -> Self {
        CrumbOptions {
            content_type,
            multipart_boundary: DEFAULT_FORM_DATA_BOUNDARY.to_string(),
            is_child: false,
        }
    }

    /// Returns a copy marked as a child (`is_child = true`), used when
    /// recursing into sub-trees.
    pub fn as_child(&self) -> Self {
        CrumbOptions {
            content_type: self.content_type,
            multipart_boundary: self.multipart_boundary.clone(),
            is_child: true,
        }
    }
}

/// The recursive crumb sum type.
#[derive(Debug, Clone)]
pub enum Crumb {
    Uuid {
        name: String,
    },
    Static {
        name: String,
        value: String,
    },
    Int {
        name: String,
        min: i64,
        max: i64,
        fixed_val: Option<i64>,
    },
    Bool {
        name: String,
        default: Option<bool>,
    },
    Float {
        name: String,
    },
    RandomString {
        name: String,
        charset: Charset,
        length: usize,
    },
    RegexString {
        name: String,
        pattern: String,
    },
    BasicAuth {
        name: String,
    },
    Array {
        name: String,
        element: Box<Crumb>,
    },
    Object {
        name: String,
        elements: Vec<Crumb>,
    },
    StringWrapped {
        name: String,
        child: Box<Crumb>,
    },
}

impl Crumb {
    pub fn key(&self) -> &str {
        match self {
            Crumb::Uuid { name }
            | Crumb::Static { name, .. }
            | Crumb::Int { name, .. }
            | Crumb::Bool { name, .. }
            | Crumb::Float { name }
            | Crumb::RandomString { name, .. }
            | Crumb::RegexString { name, .. }
            | Crumb::BasicAuth { name }
            | Crumb::Array { name, .. }
            | Crumb::Object { name, .. }
            | Crumb::StringWrapped { name, .. } => name,
        }
    }

    /// Renders the crumb's own scalar value as a string, independent of
    /// content type. Containers recurse through `render` instead; this is
    /// the leaf-level primitive used by form-encoding and path-template
    /// substitution.
    pub fn scalar_value(&self) -> String {
        match self {
            Crumb::Uuid { .. } => uuid::Uuid::new_v4().to_string(),
            Crumb::Static { value, .. } => value.clone(),
            Crumb::Int {
                min,
                max,
                fixed_val,
                ..
            } => {
                if let Some(v) = fixed_val {
                    v.to_string()
                } else {
                    let lo = *min;
                    let hi = (*max).max(lo + 1);
                    rand::Rng::gen_range(&mut rand::thread_rng(), lo..hi).to_string()
                }
            }
            Crumb::Bool { default, .. } => default.unwrap_or(true).to_string(),
            Crumb::Float { .. } => {
                format!("{:.4}", rand::Rng::gen_range(&mut rand::thread_rng(), 0.0..1000.0))
            }
            Crumb::RandomString {
                charset, length, ..
            } => random_string(*charset, *length),
            Crumb::RegexString { pattern, .. } => {
                random_from_regex(pattern).unwrap_or_default()
            }
            Crumb::BasicAuth { .. } => format!("Basic {}", basic_auth_token()),
            Crumb::Array { element, .. } => element.scalar_value(),
            Crumb::Object { .. } => String::new(),
            Crumb::StringWrapped { child, .. } => child.scalar_value(),
        }
    }

    /// A Unix-seconds timestamp approximately one hour in the past, used for
    /// `datetime`/`date-time`/`date` schema types.
    pub fn past_timestamp() -> i64 {
        (Utc::now() - chrono::Duration::hours(1)).timestamp()
    }

    /// The content-type-appropriate rendered string.
    pub fn value(&self, opts: &CrumbOptions) -> String {
        match opts.content_type {
            ContentType::Json => self.raw_value(opts).to_string(),
            ContentType::Xml => render::render_xml(self, opts),
            ContentType::FormEncoded => render::render_form(self, opts),
            ContentType::FormData => render::render_multipart(self, opts),
        }
    }

    /// Polymorphic JSON value, used directly by object/array JSON encoders
    /// so children are embedded raw rather than double-encoded: objects emit
    /// `{k: raw(v), ...}`.
    pub fn raw_value(&self, opts: &CrumbOptions) -> Json {
        match self {
            Crumb::Uuid { .. } => Json::String(uuid::Uuid::new_v4().to_string()),
            Crumb::Static { value, .. } => Json::String(value.clone()),
            Crumb::Int {
                min,
                max,
                fixed_val,
                ..
            } => {
                let v = if let Some(v) = fixed_val {
                    *v
                } else {
                    let lo = *min;
                    let hi = (*max).max(lo + 1);
                    rand::Rng::gen_range(&mut rand::thread_rng(), lo..hi)
                };
                Json::Number(v.into())
            }
            Crumb::Bool { default, .. } => Json::Bool(default.unwrap_or(true)),
            Crumb::Float { .. } => serde_json::Number::from_f64(
                rand::Rng::gen_range(&mut rand::thread_rng(), 0.0..1000.0),
            )
            .map(Json::Number)
            .unwrap_or(Json::Null),
            Crumb::RandomString {
                charset, length, ..
            } => Json::String(random_string(*charset, *length)),
            Crumb::RegexString { pattern, .. } => {
                Json::String(random_from_regex(pattern).unwrap_or_default())
            }
            Crumb::BasicAuth { .. } => Json::String(format!("Basic {}", basic_auth_token())),
            Crumb::Array { element, .. } => Json::Array(vec![element.raw_value(&opts.as_child())]),
            Crumb::Object { elements, .. } => {
                let mut map = serde_json::Map::new();
                for e in elements {
                    map.insert(e.key().to_string(), e.raw_value(&opts.as_child()));
                }
                Json::Object(map)
            }
            Crumb::StringWrapped { child, .. } => Json::String(child.scalar_value()),
        }
    }

    /// `apiKey` security-definition crumb: a 32-char hex string
    /// attached by query/header/cookie location.
    pub fn api_key(name: impl Into<String>) -> Crumb {
        Crumb::Static {
            name: name.into(),
            value: random_api_key(),
        }
    }
}

/// Base64-encoded `user:pass` credential used for `BasicAuth` crumbs and the
/// preflight prober's auth probe.
pub fn basic_auth_token() -> String {
    base64::engine::general_purpose::STANDARD.encode(b"1:1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_object() -> Crumb {
        Crumb::Object {
            name: "root".into(),
            elements: vec![
                Crumb::Static {
                    name: "a".into(),
                    value: "1".into(),
                },
                Crumb::Static {
                    name: "b".into(),
                    value: "2".into(),
                },
            ],
        }
    }

    #[test]
    fn json_round_trip_for_non_random_crumbs() {
        let c = fixed_object();
        let opts = CrumbOptions::root(ContentType::Json);
        let rendered = c.value(&opts);
        let parsed: Json = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, c.raw_value(&opts));
    }

    #[test]
    fn form_encoded_object_joins_with_ampersand() {
        let c = fixed_object();
        let opts = CrumbOptions::root(ContentType::FormEncoded);
        let rendered = c.value(&opts);
        assert_eq!(rendered, "a=1&b=2");
    }

    #[test]
    fn string_wrapped_quotes_child() {
        let c = Crumb::StringWrapped {
            name: "n".into(),
            child: Box::new(Crumb::Static {
                name: "n".into(),
                value: "123".into(),
            }),
        };
        let opts = CrumbOptions::root(ContentType::Json);
        assert_eq!(c.raw_value(&opts), Json::String("123".to_string()));
    }

    #[test]
    fn basic_auth_crumb_renders_base64_credential() {
        let c = Crumb::BasicAuth { name: "auth".into() };
        let opts = CrumbOptions::root(ContentType::Json);
        assert_eq!(
            c.raw_value(&opts),
            Json::String(format!("Basic {}", basic_auth_token()))
        );
    }
}
