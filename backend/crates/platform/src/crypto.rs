//! Cryptographic Utilities
//!
//! Token generation never degrades: if the OS entropy source fails the
//! caller gets an [`EntropyError`], not a short or zeroed buffer.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The OS random source failed
#[derive(Debug, Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(#[from] rand::Error);

/// Generate `len` cryptographically secure random bytes
pub fn random_token(len: usize) -> Result<Vec<u8>, EntropyError> {
    fill_from(&mut OsRng, len)
}

fn fill_from<R: RngCore>(rng: &mut R, len: usize) -> Result<Vec<u8>, EntropyError> {
    let mut bytes = vec![0u8; len];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Generate exactly `len` printable characters from the URL-safe base64
/// alphabet (`A-Z a-z 0-9 - _`)
pub fn random_string(len: usize) -> Result<String, EntropyError> {
    // 3 bytes encode to 4 characters; round up so the encoding is never short.
    let byte_len = (len * 3).div_ceil(4);
    let mut encoded = to_base64_url(&random_token(byte_len)?);
    encoded.truncate(len);
    Ok(encoded)
}

/// `len` random bytes rendered as URL-safe base64 (cookie-safe)
pub fn random_url_token(len: usize) -> Result<String, EntropyError> {
    Ok(to_base64_url(&random_token(len)?))
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode bytes as URL-safe base64 without padding
pub fn to_base64_url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode URL-safe base64 without padding
pub fn from_base64_url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s)
}

/// Constant-time comparison to prevent timing attacks
///
/// Lengths are not secret; only the content comparison is constant time.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
