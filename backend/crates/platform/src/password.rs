//! Secret Handling
//!
//! - [`ClearTextSecret`]: NFKC-normalized, zeroized on drop, redacted in `Debug`
//! - [`SecretPolicy`]: length and pattern rules checked before a secret is stored
//! - [`SecretDigest`]: the pluggable `H(secret ++ salt)` primitive
//!
//! ## Provided digests
//! - [`Sha256Digest`] (default)
//! - [`Sha512Digest`]
//! - [`Argon2Digest`] (Argon2id raw output keyed on the credential salt)

use std::fmt;

use argon2::Argon2;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// Default minimum secret length (code points)
pub const MIN_SECRET_LENGTH: usize = 8;

/// Default maximum secret length (code points)
pub const MAX_SECRET_LENGTH: usize = 128;

/// Digests shorter than this are refused
pub const MIN_DIGEST_LEN: usize = 32;

// ============================================================================
// Error Types
// ============================================================================

/// Secret policy violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretPolicyError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("Password contains invalid control characters")]
    InvalidCharacter,

    #[error("Password is too common or follows a predictable pattern")]
    CommonPattern,
}

/// The digest primitive failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{algorithm} digest failed: {reason}")]
pub struct DigestError {
    pub algorithm: &'static str,
    pub reason: String,
}

// ============================================================================
// Clear Text Secret (Zeroized on drop)
// ============================================================================

/// A secret as typed by the user
///
/// Normalized with NFKC on construction so that visually identical input
/// hashes identically. Not `Clone`.
///
/// ```rust
/// use platform::password::ClearTextSecret;
///
/// let secret = ClearTextSecret::new("correctHorse1");
/// assert_eq!(format!("{secret:?}"), "ClearTextSecret(\"[REDACTED]\")");
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextSecret(String);

impl ClearTextSecret {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().nfkc().collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in Unicode code points
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClearTextSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextSecret")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Rules a new secret must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_SECRET_LENGTH,
            max_length: MAX_SECRET_LENGTH,
        }
    }
}

impl SecretPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Self::default()
        }
    }

    pub fn check(&self, secret: &ClearTextSecret) -> Result<(), SecretPolicyError> {
        let value = secret.as_str();

        if value.trim().is_empty() {
            return Err(SecretPolicyError::EmptyOrWhitespace);
        }

        let char_count = secret.char_count();
        if char_count < self.min_length {
            return Err(SecretPolicyError::TooShort {
                min: self.min_length,
                actual: char_count,
            });
        }
        if char_count > self.max_length {
            return Err(SecretPolicyError::TooLong {
                max: self.max_length,
                actual: char_count,
            });
        }

        // Control characters other than tab/newline
        if value
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            return Err(SecretPolicyError::InvalidCharacter);
        }

        if is_common_pattern(value) {
            return Err(SecretPolicyError::CommonPattern);
        }

        Ok(())
    }
}

// ============================================================================
// Digest
// ============================================================================

/// `H(secret ++ salt)`
///
/// Implementations are stateless and shared across requests.
pub trait SecretDigest: Send + Sync {
    /// Label stored next to every credential produced by this digest
    fn algorithm(&self) -> &'static str;

    fn digest(&self, secret: &ClearTextSecret, salt: &[u8]) -> Result<Vec<u8>, DigestError>;
}

fn sha_digest<D: Digest>(secret: &ClearTextSecret, salt: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(secret.as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl SecretDigest for Sha256Digest {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, secret: &ClearTextSecret, salt: &[u8]) -> Result<Vec<u8>, DigestError> {
        Ok(sha_digest::<Sha256>(secret, salt))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Digest;

impl SecretDigest for Sha512Digest {
    fn algorithm(&self) -> &'static str {
        "sha512"
    }

    fn digest(&self, secret: &ClearTextSecret, salt: &[u8]) -> Result<Vec<u8>, DigestError> {
        Ok(sha_digest::<Sha512>(secret, salt))
    }
}

/// Argon2id with the library's default (OWASP) parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Digest;

impl SecretDigest for Argon2Digest {
    fn algorithm(&self) -> &'static str {
        "argon2id"
    }

    fn digest(&self, secret: &ClearTextSecret, salt: &[u8]) -> Result<Vec<u8>, DigestError> {
        let mut out = vec![0u8; MIN_DIGEST_LEN];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), salt, &mut out)
            .map_err(|e| DigestError {
                algorithm: self.algorithm(),
                reason: e.to_string(),
            })?;
        Ok(out)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check for common weak patterns
fn is_common_pattern(secret: &str) -> bool {
    let lower = secret.to_lowercase();

    // All the same character (e.g., "aaaaaaaa")
    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return true;
        }
    }

    if is_sequential_numbers(&lower) {
        return true;
    }

    const KEYBOARD_PATTERNS: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "qazwsx", "1qaz2wsx"];
    if KEYBOARD_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    const COMMON_SECRETS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "abcdefgh",
        "letmein1",
        "welcome1",
        "admin123",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "baseball",
        "trustno1",
    ];
    COMMON_SECRETS.contains(&lower.as_str())
}

/// Digits-only runs like "12345678" or "98765432"
fn is_sequential_numbers(s: &str) -> bool {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 4 {
        return false;
    }

    let ascending = digits.windows(2).all(|w| w[1] == (w[0] + 1) % 10);
    let descending = digits.windows(2).all(|w| w[0] == (w[1] + 1) % 10);
    ascending || descending
}

// ============================================================================
// Tests
// ============================================================================
