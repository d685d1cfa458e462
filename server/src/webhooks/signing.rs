//! HMAC-SHA256 Webhook Signing
//!
//! Signs the delivery body together with a unix timestamp so receivers can
//! reject replays: the signed input is `"{timestamp}.{body}"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign `{timestamp}.{payload}` with HMAC-SHA256 and return the hex-encoded
/// signature.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature against a timestamped payload.
pub fn verify_signature(secret: &str, timestamp: i64, payload: &str, signature: &str) -> bool {
    let expected = sign_payload(secret, timestamp, payload);
    // Constant-time comparison
    expected.len() == signature.len()
        && expected
            .as_bytes()
            .iter()
            .zip(signature.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Generate a random signing secret, prefixed for display purposes.
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}
