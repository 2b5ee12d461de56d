//! Inbound webhook signature verification.
//!
//! The provider signs each webhook with HMAC-SHA1 over the full request URL
//! followed by every POST parameter, sorted by name, concatenated as
//! name + value. The digest arrives base64-encoded in the
//! `X-Twilio-Signature` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;

/// Verify a webhook signature.
///
/// `url` must be the exact public URL the provider posted to, including
/// scheme and query string. `params` are the decoded form fields.
pub fn verify_webhook_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    if auth_token.is_empty() || signature.is_empty() {
        warn!(
            has_auth_token = !auth_token.is_empty(),
            has_signature = !signature.is_empty(),
            "webhook_signature_missing_fields"
        );
        return false;
    }

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut payload = url.to_string();
    for (name, value) in sorted {
        payload.push_str(name);
        payload.push_str(value);
    }

    let mut mac = match HmacSha1::new_from_slice(auth_token.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(payload.as_bytes());

    let expected = BASE64.encode(mac.finalize().into_bytes());

    let valid = constant_time_compare(&expected, signature);
    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "webhook_signature_mismatch"
        );
    }
    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
