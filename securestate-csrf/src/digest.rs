//! Hashing, signing and comparison primitives shared by the codec and validator.

use crate::error::{CsrfError, Result};
use crate::origin::OriginFacts;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// `SHA256("{ip}:{userAgent}")`
pub fn origin_hash(origin: &OriginFacts) -> String {
    sha256_hex(origin.fingerprint())
}

/// Hash of the absolute expiry instant, in unix milliseconds rendered as decimal.
pub fn expiry_hash(expires_at_ms: i64) -> String {
    sha256_hex(expires_at_ms.to_string())
}

/// HMAC-SHA256 of `payload`, hex-encoded.
pub fn sign(key: &[u8], payload: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| CsrfError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature in constant time.
pub fn verify_signature(key: &[u8], payload: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Fixed-time string equality. Lengths are not secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub fn is_lower_hex(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// 64 lowercase hex characters.
pub fn is_digest_hex(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN && is_lower_hex(value)
}
