//! Target-string parsing and file loading.
//!
//! A bare host expands to both `http://host:80` and `https://host:443`; an
//! explicit scheme or port narrows the guess; port 443 or 8443 implies TLS
//! when the scheme is missing.

use std::io::BufRead;

use crate::route::Target;

/// Parses one target spec string into one or two `Target`s. Any path suffix
/// after the authority becomes the target's `base_path`.
pub fn parse_target_spec(spec: &str) -> Vec<Target> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Vec::new();
    }

    if let Some(rest) = spec.strip_prefix("https://") {
        let (host, port, path) = split_authority(rest, 443);
        return vec![new_target(host, port, true, path)];
    }
    if let Some(rest) = spec.strip_prefix("http://") {
        let (host, port, path) = split_authority(rest, 80);
        return vec![new_target(host, port, false, path)];
    }

    let (authority, path) = split_path(spec);

    if let Some((host, port_str)) = authority.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            let tls = port == 443 || port == 8443;
            return vec![new_target(host.to_string(), port, tls, path)];
        }
    }

    vec![
        new_target(authority.to_string(), 80, false, path.clone()),
        new_target(authority.to_string(), 443, true, path),
    ]
}

fn new_target(hostname: String, port: u16, tls: bool, base_path: String) -> Target {
    Target::new(hostname, None, port, tls, base_path, Vec::new(), None)
}

fn split_authority(rest: &str, default_port: u16) -> (String, u16, String) {
    let (authority, path) = split_path(rest);
    if let Some((host, port_str)) = authority.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port, path);
        }
    }
    (authority.to_string(), default_port, path)
}

fn split_path(s: &str) -> (&str, String) {
    match s.find('/') {
        Some(i) => (&s[..i], s[i..].to_string()),
        None => (s, String::new()),
    }
}

/// Loads target specs from a file, one per line, expanding each with
/// `parse_target_spec`.
pub fn load_target_file(reader: impl BufRead) -> std::io::Result<Vec<Target>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        out.extend(parse_target_spec(line));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_expands_to_both_schemes() {
        let targets = parse_target_spec("example.com");
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().any(|t| t.port == 80 && !t.tls));
        assert!(targets.iter().any(|t| t.port == 443 && t.tls));
    }

    #[test]
    fn explicit_scheme_narrows_to_one_target() {
        let targets = parse_target_spec("https://example.com");
        assert_eq!(targets.len(), 1);
        assert!(targets[0].tls);
        assert_eq!(targets[0].port, 443);
    }

    #[test]
    fn explicit_port_implies_tls_for_8443() {
        let targets = parse_target_spec("example.com:8443");
        assert_eq!(targets.len(), 1);
        assert!(targets[0].tls);
    }

    #[test]
    fn explicit_non_tls_port_is_narrowed() {
        let targets = parse_target_spec("example.com:9000");
        assert_eq!(targets.len(), 1);
        assert!(!targets[0].tls);
        assert_eq!(targets[0].port, 9000);
    }

    #[test]
    fn path_suffix_becomes_base_path() {
        let targets = parse_target_spec("http://example.com/api/v1");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].base_path, "/api/v1");
        assert_eq!(targets[0].hostname, "example.com");
    }

    #[test]
    fn file_loader_skips_blank_and_comment_lines() {
        let targets = load_target_file(std::io::Cursor::new("example.com\n# comment\n\nhttps://foo.com\n")).unwrap();
        assert_eq!(targets.len(), 3);
    }
}
