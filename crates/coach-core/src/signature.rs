//! Request signature verification for interactive callbacks.
//!
//! The platform signs `v0:{timestamp}:{raw_body}` with HMAC-SHA256 keyed by
//! the app's signing secret and sends `v0=<hex digest>`. Verification is a
//! pure predicate over the raw body, the two headers, the secret and the
//! current time, so it can be tested without any I/O.

use crate::error::{CoachError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SIGNATURE_VERSION: &str = "v0";

/// Default replay window in seconds.
pub const DEFAULT_REPLAY_WINDOW_SECS: i64 = 300;

/// Compute the `v0=<hex>` signature for `body` sent at `timestamp`.
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CoachError::Config(format!("signing key rejected: {e}")))?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// True when the request is fresh and carries a valid signature.
///
/// Both checks always run: a stale timestamp is rejected even if the
/// signature matches, and the digest comparison is constant-time.
pub fn verify(
    body: &[u8],
    timestamp: Option<&str>,
    signature: Option<&str>,
    secret: &[u8],
    now: i64,
    replay_window_secs: i64,
) -> bool {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    let Ok(sent_at) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    let fresh = now.abs_diff(sent_at) <= replay_window_secs.unsigned_abs();

    let Ok(expected) = sign(secret, timestamp.trim(), body) else {
        return false;
    };
    let matches: bool = expected.as_bytes().ct_eq(signature.trim().as_bytes()).into();

    fresh && matches
}
