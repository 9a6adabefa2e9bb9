//! keepsafed: vault server
//!
//! ```text
//! gRPC (grpc.rs) -> Router (router.rs) -> MetadataStore + BlobStore
//!                       |
//!                 Authenticator (auth.rs)
//! ```
//! The server only ever sees ciphertext.

pub mod auth;
pub mod daemon;
pub mod grpc;
pub mod metrics;
pub mod router;

pub use auth::{Authenticator, JwtAuthenticator};
pub use router::{CallContext, Router};
