//! Record envelope encryption with AES-256-GCM
//!
//! Envelope format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No AAD: the envelope is bound to the key only, so the server can move a
//! payload between the metadata row and the blob store without touching it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::CryptoError;
use crate::kdf::MasterKey;
use crate::{KEY_SIZE, NONCE_SIZE};

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::WrongKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::WrongKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })
}

/// Seal `plaintext` under `key`.
///
/// A fresh nonce is drawn from the OS CSPRNG on every call, so two
/// encryptions of the same plaintext never share a prefix.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::PayloadTooLarge)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + sealed.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&sealed);
    Ok(result)
}

/// Open an envelope produced by [`encrypt`].
///
/// A blob too short to hold a nonce is reported exactly like a bad tag.
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;

    if blob.len() < NONCE_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, sealed)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// [`encrypt`] under a session master key
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt(key.as_bytes(), plaintext)
}

/// [`decrypt`] under a session master key
pub fn open(key: &MasterKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    decrypt(key.as_bytes(), blob)
}
