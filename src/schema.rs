//! OpenAPI-like JSON schema types and the schema → crumb mapping, modeled as
//! a sum type per field with explicit variants, accumulating parse errors
//! rather than aborting.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::crumb::random::Charset;
use crate::crumb::Crumb;
use crate::errors::{MultiError, ParserError};

/// `required` may be a bool or a list of field names in the source JSON.
/// Modeled as an explicit sum type rather than `serde_json::Value` so
/// callers match exhaustively.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Required {
    All(bool),
    Fields(Vec<String>),
}

/// A JSON-Schema-shaped node: used both for `paths[...].parameters[].schema`
/// bodies and for `paths[...].parameters[]` themselves once `name`/`in` are
/// stripped; both `Schema` and `Parameter` simply carry one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: Option<String>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub default: Option<serde_json::Value>,
    pub required: Option<Required>,
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "allOf")]
    pub all_of: Option<Vec<Schema>>,
    pub items: Option<Box<Schema>>,
}

/// A single parameter of an operation: `in` (query/header/cookie/path/body)
/// plus the schema shape inline.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub schema: Schema,
    /// A nested `schema` field, used by body parameters that wrap a full
    /// JSON-Schema object instead of inlining `type`/`properties` directly.
    pub schema_ref: Option<Box<Schema>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub consumes: Vec<String>,
}

/// A security scheme, attached to the API by name and referenced from
/// operations: security definitions attach top-level crumbs to the API by
/// `in` field.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityDefinition {
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSchema {
    #[serde(default)]
    pub ksuid: Option<String>,
    pub url: String,
    #[serde(default)]
    #[serde(rename = "securityDefinitions")]
    pub security_definitions: BTreeMap<String, SecurityDefinition>,
    pub paths: BTreeMap<String, Vec<Operation>>,
}

/// Builds a `Crumb` from a schema node, accumulating any failures into
/// `errors` rather than aborting. Mirrors the
/// original's `Typer`-dispatch-by-`type` switch.
pub fn schema_to_crumb(name: &str, schema: &Schema, errors: &mut MultiError) -> Crumb {
    let type_name = schema.schema_type.as_deref().unwrap_or("");
    match type_name {
        "object" | "" => object_crumb(name, schema, errors),
        "array" => array_crumb(name, schema, errors),
        "boolean" | "bool" => Crumb::Bool {
            name: name.to_string(),
            default: schema.default.as_ref().and_then(|v| v.as_bool()),
        },
        "integer" | "number" | "long" | "int32" | "int64" | "float32" | "float64" => {
            if schema.format.as_deref() == Some("float") {
                Crumb::Float {
                    name: name.to_string(),
                }
            } else if let Some(default) = schema.default.as_ref().and_then(|v| v.as_i64()) {
                Crumb::Int {
                    name: name.to_string(),
                    min: default,
                    max: default,
                    fixed_val: Some(default),
                }
            } else {
                Crumb::Int {
                    name: name.to_string(),
                    min: 1,
                    max: 10_000,
                    fixed_val: None,
                }
            }
        }
        "datetime" | "date-time" | "date" => Crumb::Int {
            name: name.to_string(),
            min: 0,
            max: 0,
            fixed_val: Some(Crumb::past_timestamp()),
        },
        "file" => Crumb::Static {
            name: name.to_string(),
            value: "/etc/passwd".to_string(),
        },
        "uuid" | "guid" => Crumb::Uuid {
            name: name.to_string(),
        },
        "string" => string_crumb(name, schema, errors),
        other => {
            errors.push(
                ParserError::new(
                    "unknown schema type",
                    UnknownType(other.to_string()),
                )
                .with_route(String::new(), name),
            );
            Crumb::RandomString {
                name: name.to_string(),
                charset: Charset::Alphanumeric,
                length: 8,
            }
        }
    }
}

fn object_crumb(name: &str, schema: &Schema, errors: &mut MultiError) -> Crumb {
    let mut elements = Vec::new();
    if let Some(props) = &schema.properties {
        for (key, sub) in props {
            elements.push(schema_to_crumb(key, sub, errors));
        }
    }
    if let Some(additional) = &schema.additional_properties {
        elements.push(schema_to_crumb("extra", additional, errors));
    }
    if let Some(all_of) = &schema.all_of {
        for sub in all_of {
            if let Crumb::Object {
                elements: mut inner,
                ..
            } = object_crumb(name, sub, errors)
            {
                elements.append(&mut inner);
            }
        }
    }
    Crumb::Object {
        name: name.to_string(),
        elements,
    }
}

fn array_crumb(name: &str, schema: &Schema, errors: &mut MultiError) -> Crumb {
    let element = match &schema.items {
        Some(items) => schema_to_crumb(name, items, errors),
        None => Crumb::RandomString {
            name: name.to_string(),
            charset: Charset::Alphanumeric,
            length: 8,
        },
    };
    Crumb::Array {
        name: name.to_string(),
        element: Box::new(element),
    }
}

fn string_crumb(name: &str, schema: &Schema, errors: &mut MultiError) -> Crumb {
    if let Some(pattern) = &schema.pattern {
        return Crumb::RegexString {
            name: name.to_string(),
            pattern: pattern.clone(),
        };
    }
    if let Some(default) = schema.default.as_ref().and_then(|v| v.as_str()) {
        return Crumb::Static {
            name: name.to_string(),
            value: default.to_string(),
        };
    }
    match schema.format.as_deref() {
        Some("email") => Crumb::Static {
            name: name.to_string(),
            value: "user@example.com".to_string(),
        },
        Some("uri") | Some("url") | Some("link") => Crumb::Static {
            name: name.to_string(),
            value: "http://example.com".to_string(),
        },
        Some("path") => Crumb::Static {
            name: name.to_string(),
            value: "/tmp/x".to_string(),
        },
        Some("ip") => Crumb::Static {
            name: name.to_string(),
            value: "127.0.0.1".to_string(),
        },
        Some("duration") => Crumb::Static {
            name: name.to_string(),
            value: "1h".to_string(),
        },
        Some("binary") => Crumb::RandomString {
            name: name.to_string(),
            charset: Charset::Hex,
            length: 16,
        },
        Some("uuid") | Some("guid") => Crumb::Uuid {
            name: name.to_string(),
        },
        Some(f) if f.starts_with("date") => Crumb::StringWrapped {
            name: name.to_string(),
            child: Box::new(Crumb::Int {
                name: name.to_string(),
                min: 0,
                max: 0,
                fixed_val: Some(Crumb::past_timestamp()),
            }),
        },
        Some(f) if f.starts_with("int") || f.starts_with("float") => Crumb::StringWrapped {
            name: name.to_string(),
            child: Box::new(Crumb::Int {
                name: name.to_string(),
                min: 1,
                max: 10_000,
                fixed_val: None,
            }),
        },
        Some("byte") | Some("token") => Crumb::RandomString {
            name: name.to_string(),
            charset: Charset::Hex,
            length: 16,
        },
        _ => Crumb::RandomString {
            name: name.to_string(),
            charset: Charset::Alphanumeric,
            length: 8,
        },
    }
}

/// Security-definition → crumb attachment: `apiKey` ⇒ 32-char
/// hex random, `basic` ⇒ `BasicAuth`.
pub fn security_definition_to_crumb(name: &str, def: &SecurityDefinition) -> Option<Crumb> {
    match def.scheme_type.as_str() {
        "apiKey" => Some(Crumb::api_key(def.name.clone().unwrap_or_else(|| name.to_string()))),
        "basic" => Some(Crumb::BasicAuth {
            name: name.to_string(),
        }),
        _ => None,
    }
}

#[derive(Debug)]
struct UnknownType(String);

impl std::fmt::Display for UnknownType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown schema type {:?}", self.0)
    }
}
impl std::error::Error for UnknownType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_with_properties_builds_nested_elements() {
        let json = r#"{"type":"object","properties":{"id":{"type":"integer"},"name":{"type":"string"}}}"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        let mut errors = MultiError::new();
        let crumb = schema_to_crumb("root", &schema, &mut errors);
        assert!(errors.is_empty());
        match crumb {
            Crumb::Object { elements, .. } => assert_eq!(elements.len(), 2),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn unknown_type_is_accumulated_not_fatal() {
        let schema = Schema {
            schema_type: Some("frobnicator".into()),
            ..Default::default()
        };
        let mut errors = MultiError::new();
        let crumb = schema_to_crumb("x", &schema, &mut errors);
        assert!(!errors.is_empty());
        matches!(crumb, Crumb::RandomString { .. });
    }

    #[test]
    fn pattern_wins_over_format() {
        let schema = Schema {
            schema_type: Some("string".into()),
            pattern: Some("[a-z]{3}".into()),
            format: Some("email".into()),
            ..Default::default()
        };
        let mut errors = MultiError::new();
        let crumb = schema_to_crumb("x", &schema, &mut errors);
        matches!(crumb, Crumb::RegexString { .. });
    }
}
