//! Credential hashing.  Credentials are stored as argon2id PHC strings, never
//! as the plaintext the user typed.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::error::CredentialError;

/// Hash a credential using argon2id with a random salt.
pub fn hash_credential(credential: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError(e.to_string()))
}

/// Verify a credential against a stored PHC string.  A malformed stored hash
/// never verifies.
pub fn verify_credential(credential: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(credential.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_credential("pw1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_credential("pw1", &hash));
        assert!(!verify_credential("pw2", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_credential("same").unwrap();
        let b = hash_credential("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(!verify_credential("pw1", "pw1"));
    }
}
