use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{VaultError, VaultResult};

/// Opaque user identifier, assigned by the metadata store at registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record identifier, assigned by the metadata store at creation and
/// immutable afterwards. Doubles as the blob name for file records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject ids that are empty or could escape a blob root directory
    pub fn validate(&self) -> VaultResult<()> {
        let id = self.0.as_str();
        if id.is_empty() {
            return Err(VaultError::validation("record id is empty"));
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(VaultError::validation(format!(
                "record id contains path characters: {id:?}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer token binding a request to a user. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Login material as submitted by the user, before password hashing
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub login: String,
    pub password: SecretString,
}

impl UserCredentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Closed set of record kinds.
///
/// The wire tag is stable and shared with the proto enum and the
/// `records.record_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    LoginPassword,
    File,
    Text,
    CreditCard,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        RecordType::LoginPassword,
        RecordType::File,
        RecordType::Text,
        RecordType::CreditCard,
    ];

    pub fn tag(self) -> i32 {
        match self {
            RecordType::LoginPassword => 0,
            RecordType::File => 1,
            RecordType::Text => 2,
            RecordType::CreditCard => 3,
        }
    }

    pub fn from_tag(tag: i32) -> VaultResult<Self> {
        match tag {
            0 => Ok(RecordType::LoginPassword),
            1 => Ok(RecordType::File),
            2 => Ok(RecordType::Text),
            3 => Ok(RecordType::CreditCard),
            other => Err(VaultError::validation(format!("unknown record type tag {other}"))),
        }
    }

    /// Whether the payload lives in the blob store instead of the metadata row
    pub fn is_blob(self) -> bool {
        match self {
            RecordType::File => true,
            RecordType::LoginPassword | RecordType::Text | RecordType::CreditCard => false,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::LoginPassword => "Login + password",
            RecordType::File => "Binary file",
            RecordType::Text => "Text",
            RecordType::CreditCard => "Credit card",
        };
        f.write_str(name)
    }
}

/// A full record. `payload` is ciphertext everywhere except inside the
/// client session after decryption.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub record_type: RecordType,
    pub metadata: String,
    pub payload: Vec<u8>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("record_type", &self.record_type)
            .field("metadata", &self.metadata)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Listing entry: a record without its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: RecordId,
    pub record_type: RecordType,
    pub metadata: String,
}

/// A record submitted for creation, before the store assigns an id
#[derive(Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub record_type: RecordType,
    pub metadata: String,
    pub payload: Vec<u8>,
}

impl fmt::Debug for NewRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewRecord")
            .field("record_type", &self.record_type)
            .field("metadata", &self.metadata)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_tags_are_stable() {
        for ty in RecordType::ALL {
            assert_eq!(RecordType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert_eq!(RecordType::LoginPassword.tag(), 0);
        assert_eq!(RecordType::File.tag(), 1);
        assert_eq!(RecordType::Text.tag(), 2);
        assert_eq!(RecordType::CreditCard.tag(), 3);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!(
            RecordType::from_tag(17),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn test_only_files_use_blob_store() {
        let blobs: Vec<_> = RecordType::ALL.into_iter().filter(|t| t.is_blob()).collect();
        assert_eq!(blobs, vec![RecordType::File]);
    }

    #[test]
    fn test_record_id_rejects_traversal() {
        assert!(RecordId::new("6584c88d-1bb4-4686-83be-925abb24fc20").validate().is_ok());
        assert!(RecordId::new("").validate().is_err());
        assert!(RecordId::new("../etc/passwd").validate().is_err());
        assert!(RecordId::new("a/b").validate().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let token = AuthToken::new("eyJhbGciOiJIUzI1NiJ9.secret");
        assert!(!format!("{token:?}").contains("secret"));

        let record = Record {
            id: RecordId::new("1"),
            record_type: RecordType::Text,
            metadata: "note".into(),
            payload: b"plaintext".to_vec(),
        };
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("plaintext"));
        assert!(rendered.contains("payload_len: 9"));
    }
}
