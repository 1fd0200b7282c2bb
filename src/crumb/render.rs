//! Per-content-type crumb renderers.

use crate::crumb::{Crumb, CrumbOptions};

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// The value a crumb contributes when nested as a field inside a form body:
/// containers flatten to their own rendered string, which may itself be a
/// URL-encoded blob — this is intentional.
fn form_field_value(c: &Crumb, opts: &CrumbOptions) -> String {
    match c {
        Crumb::Object { .. } => render_form(c, &opts.as_child()),
        Crumb::Array { element, .. } => form_field_value(element, &opts.as_child()),
        Crumb::StringWrapped { child, .. } => child.scalar_value(),
        _ => c.scalar_value(),
    }
}

/// `k=v&k=v…`. Only `Object` produces a joined string at the
/// top level; a bare `Array` flattens to its single element's value.
pub fn render_form(c: &Crumb, opts: &CrumbOptions) -> String {
    match c {
        Crumb::Object { elements, .. } => elements
            .iter()
            .map(|e| {
                let key = match e {
                    Crumb::Array { name, element } if element.key().is_empty() => name.clone(),
                    Crumb::Array { element, .. } => element.key().to_string(),
                    other => other.key().to_string(),
                };
                format!(
                    "{}={}",
                    url_encode(&key),
                    url_encode(&form_field_value(e, opts))
                )
            })
            .collect::<Vec<_>>()
            .join("&"),
        Crumb::Array { element, .. } => form_field_value(element, opts),
        _ => c.scalar_value(),
    }
}

/// XML rendering: a processing instruction only at the true root
/// (`opts.is_child == false`); arrays whose element carries no name inherit
/// the parent's tag name.
pub fn render_xml(c: &Crumb, opts: &CrumbOptions) -> String {
    let mut buf = String::new();
    if !opts.is_child {
        buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    }
    write_xml_node(c, opts, &mut buf);
    buf
}

fn write_xml_node(c: &Crumb, opts: &CrumbOptions, buf: &mut String) {
    match c {
        Crumb::Object { name, elements } => {
            buf.push_str(&format!("<{name}>"));
            for e in elements {
                write_xml_node(e, &opts.as_child(), buf);
            }
            buf.push_str(&format!("</{name}>"));
        }
        Crumb::Array { name, element } => {
            let tag = if element.key().is_empty() {
                name.as_str()
            } else {
                element.key()
            };
            buf.push_str(&format!("<{tag}>"));
            buf.push_str(&quick_xml::escape::escape(element.scalar_value()));
            buf.push_str(&format!("</{tag}>"));
        }
        _ => {
            let name = c.key();
            buf.push_str(&format!(
                "<{name}>{}</{name}>",
                quick_xml::escape::escape(c.scalar_value())
            ));
        }
    }
}

/// A proper multipart message with the fixed boundary, nested
/// objects/arrays rendered as form-encoded values within each field.
pub fn render_multipart(c: &Crumb, opts: &CrumbOptions) -> String {
    let Crumb::Object { elements, .. } = c else {
        return c.scalar_value();
    };
    let boundary = &opts.multipart_boundary;
    let mut out = String::new();
    for e in elements {
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            e.key()
        ));
        let value = match e {
            Crumb::Object { .. } | Crumb::Array { .. } => render_form(e, &opts.as_child()),
            _ => e.scalar_value(),
        };
        out.push_str(&value);
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crumb::ContentType;

    #[test]
    fn xml_root_gets_processing_instruction_children_do_not() {
        let c = Crumb::Object {
            name: "root".into(),
            elements: vec![Crumb::Static {
                name: "a".into(),
                value: "1".into(),
            }],
        };
        let root_opts = CrumbOptions::root(ContentType::Xml);
        let rendered = render_xml(&c, &root_opts);
        assert!(rendered.starts_with("<?xml"));
        assert!(!rendered[6..].contains("<?xml"));
    }

    #[test]
    fn multipart_contains_boundary_markers() {
        let c = Crumb::Object {
            name: "root".into(),
            elements: vec![Crumb::Static {
                name: "a".into(),
                value: "1".into(),
            }],
        };
        let opts = CrumbOptions::root(ContentType::FormData);
        let rendered = render_multipart(&c, &opts);
        assert!(rendered.contains(&opts.multipart_boundary));
        assert!(rendered.trim_end().ends_with("--"));
    }
}
