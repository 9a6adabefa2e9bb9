//! Password-at-rest hashing for account rows

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// `hex(SHA-256(login || password))`.
///
/// Keyed by login so equal passwords on different accounts differ at rest.
/// Not memory-hard.
pub fn hash_password(login: &str, password: &SecretString) -> String {
    let mut hasher = Sha256::new();
    hasher.update(login.as_bytes());
    hasher.update(password.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_concatenation_digest() {
        let hashed = hash_password("u", &SecretString::from("p"));
        let expected = hex::encode(Sha256::digest(b"up"));
        assert_eq!(hashed, expected);
        assert_eq!(hashed.len(), 64);
    }

    #[test]
    fn test_hash_depends_on_login() {
        let pw = SecretString::from("same-password");
        assert_ne!(hash_password("alice", &pw), hash_password("bob", &pw));
    }
}
