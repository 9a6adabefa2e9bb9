//! Key derivation: master secret → master key (SHA-256)

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit record encryption key derived from the user's master secret.
///
/// Lives only inside a client session. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the master key as SHA-256 of the user-supplied secret.
///
/// Unsalted and deterministic: a returning user typing the same secret gets
/// the same key on any machine. Total over all inputs, including empty.
pub fn derive_master_key(secret: &[u8]) -> MasterKey {
    let mut digest: [u8; KEY_SIZE] = Sha256::digest(secret).into();
    let key = MasterKey::from_bytes(digest);
    digest.zeroize();
    key
}
