//! The ordered response-validator chain.

use crate::baseline::WildcardResponses;
use crate::errors::ValidationError;
use crate::route::{Range, Response};

/// A single response field view a validator checks; kept separate from
/// `route::Response` so validators don't need the full chain/body.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView {
    pub status: u16,
    pub length: u64,
    pub words: u64,
    pub lines: u64,
    pub basepath_len: u64,
    pub has_amzn_requestid_header: bool,
}

impl ResponseView {
    pub fn from_response(r: &Response, basepath_len: u64, has_amzn_header: bool) -> Self {
        ResponseView {
            status: r.status_code,
            length: r.body_length,
            words: r.words,
            lines: r.lines,
            basepath_len,
            has_amzn_requestid_header: has_amzn_header,
        }
    }
}

pub trait RequestValidator: Send + Sync {
    /// Returns `Ok(())` if the response is accepted, or the first failing
    /// reason otherwise.
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError>;
}

/// Literal fingerprint filters for well-known platform error pages.
pub struct KnownBadSites;

impl RequestValidator for KnownBadSites {
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError> {
        if resp.status == 400 && resp.length == 1555 && resp.words == 82 && resp.lines == 12 {
            return Err(ValidationError::GoogleBadRequest);
        }
        // Three distinct Amazon API-Gateway error bodies: "Authorization header
        // cannot be empty", "...requires 'Credential'/'Signature'/...", and
        // "not a valid key=value pair ... in Authorization header".
        let is_amazon_gateway_body = resp.lines == 1
            && ((resp.words == 6 && resp.length == 54)
                || (resp.words == 28 && resp.length >= 277)
                || (resp.words == 13 && resp.length >= 99));
        if resp.status == 403 && resp.has_amzn_requestid_header && is_amazon_gateway_body {
            return Err(ValidationError::AmazonGatewayBadRequest);
        }
        Ok(())
    }
}

/// Baseline comparison against a target's accumulated fingerprint set.
pub struct Wildcard<'a> {
    pub baselines: &'a WildcardResponses,
}

impl RequestValidator for Wildcard<'_> {
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError> {
        for b in self.baselines.iter() {
            let status_close = resp.status == b.status_code
                || (resp.status >= b.status_code && resp.status - b.status_code < 50);
            if !status_close {
                continue;
            }
            if resp.length == b.content_length {
                return Err(ValidationError::LengthMatch);
            }
            if resp.length == b.adjusted_content_length + b.adjustment_scale * resp.basepath_len {
                return Err(ValidationError::ScaledLengthMatch);
            }
            if resp.words == b.word_count && resp.lines == b.line_count {
                return Err(ValidationError::WordCountMatch);
            }
        }
        Ok(())
    }
}

/// Rejects responses whose length falls within any configured ignore range.
pub struct ContentLengthRange {
    pub ranges: Vec<Range>,
}

impl RequestValidator for ContentLengthRange {
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError> {
        if self.ranges.iter().any(|r| r.contains(resp.length as i64)) {
            return Err(ValidationError::ContentLengthRangeMatch);
        }
        Ok(())
    }
}

/// Rejects when non-empty and the status is not in the set.
pub struct StatusCodeWhitelist {
    pub codes: Vec<u16>,
}

impl RequestValidator for StatusCodeWhitelist {
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError> {
        if !self.codes.is_empty() && !self.codes.contains(&resp.status) {
            return Err(ValidationError::WhitelistedStatusCode);
        }
        Ok(())
    }
}

/// Rejects when the status is in the set.
pub struct StatusCodeBlacklist {
    pub codes: Vec<u16>,
}

impl RequestValidator for StatusCodeBlacklist {
    fn validate(&self, resp: &ResponseView) -> Result<(), ValidationError> {
        if self.codes.contains(&resp.status) {
            return Err(ValidationError::BlacklistedStatusCode);
        }
        Ok(())
    }
}

/// Runs an ordered chain of validators, returning the first failure. A
/// response is accepted only if every validator returns `Ok`.
pub fn validate_chain(
    resp: &ResponseView,
    validators: &[&dyn RequestValidator],
) -> Result<(), ValidationError> {
    for v in validators {
        v.validate(resp)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::WildcardResponse;

    fn view(status: u16, length: u64, words: u64, lines: u64) -> ResponseView {
        ResponseView {
            status,
            length,
            words,
            lines,
            basepath_len: 6,
            has_amzn_requestid_header: false,
        }
    }

    #[test]
    fn wildcard_rejects_exact_length_match() {
        let mut baselines = WildcardResponses::default();
        baselines.push_unique(WildcardResponse {
            status_code: 200,
            content_length: 9,
            adjusted_content_length: 9,
            adjustment_scale: 0,
            word_count: 2,
            line_count: 1,
        });
        let v = Wildcard {
            baselines: &baselines,
        };
        assert!(v.validate(&view(200, 9, 2, 1)).is_err());
        assert!(v.validate(&view(200, 40, 5, 2)).is_ok());
    }

    fn view_with_amzn_header(status: u16, length: u64, words: u64, lines: u64) -> ResponseView {
        ResponseView {
            has_amzn_requestid_header: true,
            ..view(status, length, words, lines)
        }
    }

    #[test]
    fn known_bad_sites_matches_all_three_amazon_gateway_signatures() {
        let v = KnownBadSites;
        assert!(v.validate(&view_with_amzn_header(403, 54, 6, 1)).is_err());
        assert!(v.validate(&view_with_amzn_header(403, 277, 28, 1)).is_err());
        assert!(v.validate(&view_with_amzn_header(403, 400, 28, 1)).is_err());
        assert!(v.validate(&view_with_amzn_header(403, 99, 13, 1)).is_err());
        // Without the confirming header, none of the signatures match.
        assert!(v.validate(&view(403, 54, 6, 1)).is_ok());
        // A 403 of the right length but wrong word/line count doesn't match.
        assert!(v.validate(&view_with_amzn_header(403, 54, 1, 1)).is_ok());
    }

    #[test]
    fn known_bad_sites_matches_google_fingerprint() {
        let v = KnownBadSites;
        assert!(v.validate(&view(400, 1555, 82, 12)).is_err());
        assert!(v.validate(&view(400, 1000, 10, 5)).is_ok());
    }

    #[test]
    fn status_whitelist_rejects_non_members() {
        let v = StatusCodeWhitelist { codes: vec![500] };
        assert!(v.validate(&view(200, 10, 1, 1)).is_err());
        assert!(v.validate(&view(500, 10, 1, 1)).is_ok());
    }

    #[test]
    fn chain_stops_at_first_failure() {
        let whitelist = StatusCodeWhitelist { codes: vec![500] };
        let blacklist = StatusCodeBlacklist { codes: vec![500] };
        let validators: Vec<&dyn RequestValidator> = vec![&whitelist, &blacklist];
        let err = validate_chain(&view(500, 10, 1, 1), &validators).unwrap_err();
        assert_eq!(err, ValidationError::BlacklistedStatusCode);
    }
}
