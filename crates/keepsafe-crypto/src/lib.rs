//! keepsafe-crypto: client-side envelope encryption for Keepsafe records
//!
//! Record payloads are sealed on the client before they leave the process;
//! the server and both stores only ever see the envelope.
//!
//! ```text
//! master secret ──SHA-256──▶ MasterKey (256-bit, client session only)
//!   └── record payload: AES-256-GCM (key=MasterKey, nonce=random 96-bit)
//!         envelope = nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! Account passwords are hashed separately (`password::hash_password`) and
//! never touch the master key.

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod password;

pub use envelope::{decrypt, encrypt, open, seal};
pub use error::CryptoError;
pub use kdf::{derive_master_key, MasterKey};
pub use password::hash_password;

/// Size of a master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
