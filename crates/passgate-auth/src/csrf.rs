//! CSRF header matching.

use passgate_api::IncomingRequest;
use passgate_core::CSRF_HEADER;

use crate::cookie::CookieClaims;

/// True iff the claims carry a CSRF value equal to the `X-CSRF-TOKEN` header.
pub fn csrf_valid(claims: &CookieClaims, request: &IncomingRequest) -> bool {
    // Stricter than a bare presence check: an empty claim never matches, so a
    // request without the header cannot pass against a token minted with `""`.
    let Some(expected) = claims.csrf.as_deref().filter(|c| !c.is_empty()) else {
        return false;
    };
    let presented = request.header_str(CSRF_HEADER).unwrap_or("");
    constant_time_eq(expected.as_bytes(), presented.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
