//! Charset constants and random-value generation for leaf crumbs; pattern-
//! based body generators need a regex-to-string sampler.

use rand::distributions::Distribution;
use rand::Rng;

pub const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const HEX: &[u8] = b"0123456789abcdef";
pub const ALPHA: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const NUMERIC: &[u8] = b"0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Alphanumeric,
    Hex,
    Alpha,
    Numeric,
}

impl Charset {
    fn bytes(self) -> &'static [u8] {
        match self {
            Charset::Alphanumeric => ALPHANUMERIC,
            Charset::Hex => HEX,
            Charset::Alpha => ALPHA,
            Charset::Numeric => NUMERIC,
        }
    }
}

/// Draws `length` bytes from `charset`.
pub fn random_string(charset: Charset, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let set = charset.bytes();
    (0..length)
        .map(|_| set[rng.gen_range(0..set.len())] as char)
        .collect()
}

/// 32-char hex random value, used for `apiKey` security-definition crumbs.
pub fn random_api_key() -> String {
    random_string(Charset::Hex, 32)
}

/// Samples a string matching `pattern`. Falls back to an empty string if the
/// pattern fails to compile as a generator (malformed regex is accumulated
/// into the caller's multi-error, not panicked on).
pub fn random_from_regex(pattern: &str) -> Option<String> {
    let gen = rand_regex::Regex::compile(pattern, 16).ok()?;
    let mut rng = rand::thread_rng();
    Some(gen.sample(&mut rng))
}

/// Two random lowercase-alpha segments joined by `/`, used by the preflight
/// prober's nested-path probe.
pub fn random_two_segment_path() -> String {
    format!(
        "/{}/{}",
        random_string(Charset::Alpha, 8),
        random_string(Charset::Alpha, 8)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        assert_eq!(random_string(Charset::Hex, 10).len(), 10);
    }

    #[test]
    fn hex_charset_only_emits_hex_digits() {
        let s = random_string(Charset::Hex, 64);
        assert!(s.bytes().all(|b| HEX.contains(&b)));
    }

    #[test]
    fn api_key_is_32_chars() {
        assert_eq!(random_api_key().len(), 32);
    }
}
