use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("wrong key length: expected {expected} bytes, got {actual}")]
    WrongKeyLength { expected: usize, actual: usize },

    /// Tag did not verify. Covers a wrong key, tampering and truncation alike.
    #[error("authentication failed: wrong key or corrupted ciphertext")]
    AuthenticationFailed,

    /// Plaintext exceeds the AES-GCM per-message limit (~64 GiB)
    #[error("payload too large to seal")]
    PayloadTooLarge,
}
