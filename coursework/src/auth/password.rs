//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::fmt;

use crate::errors::Error;

/// Accepted password length, in characters: `MIN_PASSWORD_LENGTH..MAX_PASSWORD_LENGTH`.
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 400;

/// A PHC-format Argon2 hash string. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Wrap a hash read back from storage. No parsing happens until verification.
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(..)")
    }
}

/// Argon2 hashing parameters. Fixed for the whole system so every stored hash stays verifiable.
#[derive(Debug, Clone, Copy)]
struct Argon2Params {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    output_len: usize,
}

const ARGON2_PARAMS: Argon2Params = Argon2Params {
    memory_kib: 19456, // 19 MB
    iterations: 2,
    parallelism: 1,
    output_len: 32,
};

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params =
            Params::new(self.memory_kib, self.iterations, self.parallelism, Some(self.output_len)).map_err(|e| Error::Internal {
                operation: format!("create argon2 params: {e}"),
            })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Check a candidate password against the accepted length band.
pub fn validate_password_length(password: &str) -> Result<(), Error> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    if len >= MAX_PASSWORD_LENGTH {
        return Err(Error::validation(
            "password",
            format!("Password must be shorter than {MAX_PASSWORD_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// Hash a password. Rejects out-of-band lengths before doing any expensive work.
pub fn hash_password(password: &str) -> Result<HashedPassword, Error> {
    validate_password_length(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = ARGON2_PARAMS.to_argon2()?;

    let hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(HashedPassword(hash.to_string()))
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on mismatch. A hash that cannot be parsed, or that names an
/// algorithm we cannot run, is reported as [`Error::CorruptCredential`].
pub fn verify_password(hash: &HashedPassword, password: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash.as_str()).map_err(|e| {
        tracing::error!(error = %e, "Stored password hash could not be parsed");
        Error::CorruptCredential
    })?;

    // Verification always uses params from the hash
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash could not be verified");
            Err(Error::CorruptCredential)
        }
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(password: String) -> Result<HashedPassword, Error> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(hash: HashedPassword, password: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(hash.as_str().starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert!(verify_password(&hash, password).unwrap());
        assert!(!verify_password(&hash, "wrong_password").unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let password = "same_password";

        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_password(&hash1, password).unwrap());
        assert!(verify_password(&hash2, password).unwrap());
    }

    #[test]
    fn test_length_band() {
        assert!(matches!(hash_password("short"), Err(Error::Validation { field: "password", .. })));
        assert!(hash_password(&"a".repeat(MIN_PASSWORD_LENGTH)).is_ok());
        assert!(validate_password_length(&"a".repeat(MAX_PASSWORD_LENGTH - 1)).is_ok());
        assert!(matches!(
            hash_password(&"a".repeat(MAX_PASSWORD_LENGTH)),
            Err(Error::Validation { field: "password", .. })
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 8 characters, 16 bytes
        assert!(validate_password_length("ääääääää").is_ok());
        // 4 characters, 8 bytes
        assert!(validate_password_length("ääää").is_err());
    }

    #[test]
    fn test_malformed_hash_is_corrupt_credential() {
        let hash = HashedPassword::from_stored("not-a-phc-string".to_string());
        assert!(matches!(verify_password(&hash, "whatever123"), Err(Error::CorruptCredential)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let hash = hash_password("debug_password").unwrap();
        assert_eq!(format!("{hash:?}"), "HashedPassword(..)");
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password_async("async_password".to_string()).await.unwrap();
        assert!(verify_password_async(hash.clone(), "async_password".to_string()).await.unwrap());
        assert!(!verify_password_async(hash, "other_password".to_string()).await.unwrap());
    }
}
