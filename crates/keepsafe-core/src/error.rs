use keepsafe_crypto::CryptoError;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Error taxonomy shared by the router, both stores, and the client session.
///
/// Every variant is terminal for the operation that produced it.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A required field was empty or malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// Bad login/password, or a missing, invalid, or expired token
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Login already registered
    #[error("conflict: {0}")]
    Conflict(String),

    /// Record or user absent, or not owned by the caller
    #[error("not found: {0}")]
    NotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Any underlying store fault not otherwise classified
    #[error("storage error: {0}")]
    Storage(String),
}

impl VaultError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Rebuild a `VaultError` from a status returned by the server.
    ///
    /// `Internal` (and anything unexpected) folds into `Storage`: the server
    /// never reports crypto failures since it never decrypts.
    pub fn from_status(status: &tonic::Status) -> Self {
        let msg = status.message().to_string();
        match status.code() {
            tonic::Code::InvalidArgument => Self::Validation(msg),
            tonic::Code::Unauthenticated => Self::Authentication(msg),
            tonic::Code::AlreadyExists => Self::Conflict(msg),
            tonic::Code::NotFound => Self::NotFound(msg),
            _ => Self::Storage(msg),
        }
    }
}

impl From<VaultError> for tonic::Status {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Validation(msg) => tonic::Status::invalid_argument(msg),
            VaultError::Authentication(msg) => tonic::Status::unauthenticated(msg),
            VaultError::Conflict(msg) => tonic::Status::already_exists(msg),
            VaultError::NotFound(msg) => tonic::Status::not_found(msg),
            // Details of internal faults stay in the server log
            VaultError::Crypto(_) | VaultError::Storage(_) => {
                tonic::Status::internal("internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_preserves_kind() {
        let cases = [
            VaultError::validation("login is empty"),
            VaultError::unauthenticated("bad token"),
            VaultError::Conflict("login taken".into()),
            VaultError::NotFound("no such record".into()),
        ];
        for err in cases {
            let expected = std::mem::discriminant(&err);
            let status: tonic::Status = err.into();
            let back = VaultError::from_status(&status);
            assert_eq!(std::mem::discriminant(&back), expected);
        }
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let status: tonic::Status = VaultError::storage("sqlite: disk I/O error").into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(!status.message().contains("sqlite"));

        let status: tonic::Status = VaultError::Crypto(CryptoError::AuthenticationFailed).into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(matches!(
            VaultError::from_status(&status),
            VaultError::Storage(_)
        ));
    }
}
