//! Weak entity tags for conditional requests.
//!
//! Same scheme as the `etag` npm package used by the upstream servers, so a
//! tag computed from a cached body matches the one the server would send.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

/// Tag for an empty body.
pub const EMPTY_WEAK_ETAG: &str = r#"W/"0-0""#;

/// Compute `W/"<hex length>-<first 27 chars of base64(sha1)>"` for `body`.
pub fn weak_etag(body: &[u8]) -> String {
    if body.is_empty() {
        return EMPTY_WEAK_ETAG.to_owned();
    }

    let digest = Sha1::digest(body);
    let encoded = STANDARD.encode(digest);

    format!(r#"W/"{:x}-{}""#, body.len(), &encoded[..27])
}
