pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use error::{VaultError, VaultResult};
pub use types::{AuthToken, NewRecord, Record, RecordId, RecordInfo, RecordType, UserCredentials, UserId};

/// Generated gRPC types and service traits (from keepsafe.proto)
pub mod proto {
    tonic::include_proto!("keepsafe");
}
