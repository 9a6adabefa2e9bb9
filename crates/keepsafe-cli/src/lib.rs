//! keepsafe-cli: client-side session over the vault gRPC API
//!
//! Plaintext and the master key never leave this crate; the connection
//! only carries ciphertext.

pub mod conn;
pub mod payload;
pub mod session;

pub use conn::{GrpcConn, VaultConn};
pub use session::Session;
