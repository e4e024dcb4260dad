//! Credential Manager
//!
//! Derives, rotates and verifies salted credentials behind a pluggable
//! [`SecretDigest`]. Also hosts the pluggable [`FormatChecker`] used on
//! registration and secret change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::crypto::{constant_time_eq, random_token};
use platform::password::{
    ClearTextSecret, MIN_DIGEST_LEN, SecretDigest, SecretPolicy, Sha256Digest,
};

use crate::domain::entity::identity::Credential;
use crate::domain::value_object::email::Email;
use crate::error::{MembershipError, MembershipResult};

/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// Credential manager
#[derive(Clone)]
pub struct CredentialManager {
    digest: Arc<dyn SecretDigest>,
}

impl CredentialManager {
    /// Build around `digest`, running a self-test first.
    ///
    /// Fails with `DigestUnavailable` if the primitive errors or its output
    /// is shorter than 256 bits.
    pub fn new(digest: Arc<dyn SecretDigest>) -> MembershipResult<Self> {
        let probe = ClearTextSecret::new("digest self-test");
        let output = digest
            .digest(&probe, &[0u8; SALT_LEN])
            .map_err(|e| MembershipError::DigestUnavailable(e.to_string()))?;
        if output.len() < MIN_DIGEST_LEN {
            return Err(MembershipError::DigestUnavailable(format!(
                "{} produced {} bytes, need at least {}",
                digest.algorithm(),
                output.len(),
                MIN_DIGEST_LEN
            )));
        }

        tracing::debug!(algorithm = digest.algorithm(), "Secret digest ready");
        Ok(Self { digest })
    }

    /// SHA-256 manager (the default digest)
    pub fn sha256() -> MembershipResult<Self> {
        Self::new(Arc::new(Sha256Digest))
    }

    pub fn algorithm(&self) -> &'static str {
        self.digest.algorithm()
    }

    /// Fresh salt, `H(secret ++ salt)`, stamped with `now`
    pub fn derive(&self, secret: &ClearTextSecret, now: DateTime<Utc>) -> MembershipResult<Credential> {
        let salt = random_token(SALT_LEN)?;
        self.derive_with_salt(secret, salt, now)
    }

    fn derive_with_salt(
        &self,
        secret: &ClearTextSecret,
        salt: Vec<u8>,
        now: DateTime<Utc>,
    ) -> MembershipResult<Credential> {
        let hashed_secret = self
            .digest
            .digest(secret, &salt)
            .map_err(|e| MembershipError::DigestUnavailable(e.to_string()))?;

        Ok(Credential {
            hashed_secret,
            salt,
            algorithm: self.digest.algorithm().to_string(),
            created_at: now,
        })
    }

    /// Derive a replacement for `current`; returns `(new, previous)`.
    ///
    /// The new salt never equals the previous one.
    pub fn rotate(
        &self,
        current: Credential,
        new_secret: &ClearTextSecret,
        now: DateTime<Utc>,
    ) -> MembershipResult<(Credential, Credential)> {
        let mut salt = random_token(SALT_LEN)?;
        while salt == current.salt {
            salt = random_token(SALT_LEN)?;
        }
        let next = self.derive_with_salt(new_secret, salt, now)?;
        Ok((next, current))
    }

    /// Recompute and compare in constant time.
    ///
    /// A credential produced by another algorithm never verifies.
    pub fn verify(&self, secret: &ClearTextSecret, credential: &Credential) -> bool {
        if credential.algorithm != self.digest.algorithm() {
            tracing::warn!(
                stored = %credential.algorithm,
                configured = self.digest.algorithm(),
                "Credential algorithm mismatch"
            );
            return false;
        }

        match self.digest.digest(secret, &credential.salt) {
            Ok(candidate) => constant_time_eq(&candidate, &credential.hashed_secret),
            Err(e) => {
                tracing::error!(error = %e, "Secret digest failed during verification");
                false
            }
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("algorithm", &self.digest.algorithm())
            .finish()
    }
}

// ============================================================================
// Format Checker
// ============================================================================

/// Pluggable email/secret format rules
pub trait FormatChecker: Send + Sync {
    fn check_email(&self, raw: &str) -> MembershipResult<Email>;

    fn check_secret(&self, secret: &ClearTextSecret) -> MembershipResult<()>;
}

/// [`Email`] rules plus a [`SecretPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatChecker {
    pub policy: SecretPolicy,
}

impl DefaultFormatChecker {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            policy: SecretPolicy::with_min_length(min_length),
        }
    }
}

impl FormatChecker for DefaultFormatChecker {
    fn check_email(&self, raw: &str) -> MembershipResult<Email> {
        Email::new(raw)
    }

    fn check_secret(&self, secret: &ClearTextSecret) -> MembershipResult<()> {
        self.policy.check(secret)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::password::{Argon2Digest, DigestError, Sha512Digest};
    use std::collections::HashSet;

    struct ShortDigest;

    impl SecretDigest for ShortDigest {
        fn algorithm(&self) -> &'static str {
            "short"
        }

        fn digest(&self, _: &ClearTextSecret, _: &[u8]) -> Result<Vec<u8>, DigestError> {
            Ok(vec![0u8; 16])
        }
    }

    struct BrokenDigest;

    impl SecretDigest for BrokenDigest {
        fn algorithm(&self) -> &'static str {
            "broken"
        }

        fn digest(&self, _: &ClearTextSecret, _: &[u8]) -> Result<Vec<u8>, DigestError> {
            Err(DigestError {
                algorithm: "broken",
                reason: "not linked".to_string(),
            })
        }
    }

    fn secret(s: &str) -> ClearTextSecret {
        ClearTextSecret::new(s)
    }

    #[test]
    fn test_verify_derived() {
        let manager = CredentialManager::sha256().unwrap();
        let now = Utc::now();
        for s in ["correctHorse1", "パスワード安全です!", "x"] {
            let credential = manager.derive(&secret(s), now).unwrap();
            assert!(manager.verify(&secret(s), &credential), "{s}");
            assert_eq!(credential.salt.len(), SALT_LEN);
            assert_eq!(credential.algorithm, "sha256");
            assert_eq!(credential.created_at, now);
        }
    }

    #[test]
    fn test_wrong_secret_fails() {
        let manager = CredentialManager::sha256().unwrap();
        let credential = manager.derive(&secret("correctHorse1"), Utc::now()).unwrap();
        assert!(!manager.verify(&secret("correctHorse2"), &credential));
        assert!(!manager.verify(&secret(""), &credential));
    }

    #[test]
    fn test_salts_never_repeat() {
        let manager = CredentialManager::sha256().unwrap();
        let now = Utc::now();
        let s = secret("correctHorse1");

        let mut salts = HashSet::new();
        let mut hashes = HashSet::new();
        for _ in 0..1000 {
            let credential = manager.derive(&s, now).unwrap();
            assert!(salts.insert(credential.salt));
            assert!(hashes.insert(credential.hashed_secret));
        }
    }

    #[test]
    fn test_rotate_uses_fresh_salt() {
        let manager = CredentialManager::sha256().unwrap();
        let now = Utc::now();
        let original = manager.derive(&secret("correctHorse1"), now).unwrap();

        let (next, previous) = manager
            .rotate(original.clone(), &secret("batteryStaple9"), now)
            .unwrap();
        assert_ne!(next.salt, previous.salt);
        assert_eq!(previous, original);
        assert!(manager.verify(&secret("batteryStaple9"), &next));
        assert!(!manager.verify(&secret("correctHorse1"), &next));
    }

    #[test]
    fn test_other_algorithm_fails_closed() {
        let sha256 = CredentialManager::sha256().unwrap();
        let sha512 = CredentialManager::new(Arc::new(Sha512Digest)).unwrap();
        let credential = sha512.derive(&secret("correctHorse1"), Utc::now()).unwrap();

        assert!(sha512.verify(&secret("correctHorse1"), &credential));
        assert!(!sha256.verify(&secret("correctHorse1"), &credential));
    }

    #[test]
    fn test_argon2_manager() {
        let manager = CredentialManager::new(Arc::new(Argon2Digest)).unwrap();
        let credential = manager.derive(&secret("correctHorse1"), Utc::now()).unwrap();
        assert_eq!(credential.algorithm, "argon2id");
        assert!(manager.verify(&secret("correctHorse1"), &credential));
        assert!(!manager.verify(&secret("correctHorse2"), &credential));
    }

    #[test]
    fn test_self_test_fails_fast() {
        assert!(matches!(
            CredentialManager::new(Arc::new(ShortDigest)),
            Err(MembershipError::DigestUnavailable(_))
        ));
        assert!(matches!(
            CredentialManager::new(Arc::new(BrokenDigest)),
            Err(MembershipError::DigestUnavailable(_))
        ));
    }

    #[test]
    fn test_default_format_checker() {
        let checker = DefaultFormatChecker::default();
        assert!(checker.check_email("alice@example.com").is_ok());
        assert!(matches!(
            checker.check_email("alice"),
            Err(MembershipError::InvalidEmail(_))
        ));
        assert!(checker.check_secret(&secret("correctHorse1")).is_ok());
        assert!(matches!(
            checker.check_secret(&secret("short")),
            Err(MembershipError::InvalidSecret(_))
        ));
    }
}
