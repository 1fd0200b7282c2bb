//! Wire response and redirect-chain representation.

use crate::errors::RedirectError;

/// A single hop's response. A redirect chain is a linked list where each hop
/// owns its successor.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status_code: u16,
    pub body_length: u64,
    pub words: u64,
    pub lines: u64,
    pub headers: Option<Vec<(String, String)>>,
    pub body: Option<Vec<u8>>,
    /// Empty for the first response in a chain (it equals the request URI).
    pub final_uri: String,
    pub redirect: Option<Box<Response>>,
    pub error: Option<RedirectError>,
}

impl Response {
    /// Computes `words`/`lines` from a raw body the way the engine does it
    /// regardless of whether the body is retained:
    /// space-count + 1 when non-empty, newline-count + 1 when non-empty.
    pub fn count_words_lines(body: &[u8]) -> (u64, u64) {
        if body.is_empty() {
            return (0, 0);
        }
        let words = body.iter().filter(|b| **b == b' ').count() as u64 + 1;
        let lines = body.iter().filter(|b| **b == b'\n').count() as u64 + 1;
        (words, lines)
    }

    /// Walks the chain, returning every hop from the head.
    pub fn flatten(&self) -> Vec<&Response> {
        let mut out = vec![self];
        let mut cur = &self.redirect;
        while let Some(r) = cur {
            out.push(r);
            cur = &r.redirect;
        }
        out
    }

    pub fn chain_len(&self) -> usize {
        self.flatten().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_has_zero_counts() {
        assert_eq!(Response::count_words_lines(b""), (0, 0));
    }

    #[test]
    fn counts_are_count_plus_one() {
        assert_eq!(Response::count_words_lines(b"a b c"), (3, 1));
        assert_eq!(Response::count_words_lines(b"a\nb\nc"), (1, 3));
    }

    #[test]
    fn chain_length_and_head_final_uri() {
        let tail = Response {
            status_code: 200,
            final_uri: "/b".into(),
            ..Default::default()
        };
        let head = Response {
            status_code: 302,
            final_uri: String::new(),
            redirect: Some(Box::new(tail)),
            ..Default::default()
        };
        assert_eq!(head.chain_len(), 2);
        assert_eq!(head.final_uri, "");
    }
}
