//! Metadata store contract

use async_trait::async_trait;
use keepsafe_core::{RecordId, RecordInfo, RecordType, UserId, VaultResult};

/// A record row as submitted for insertion.
///
/// `payload` is `None` for file records, whose ciphertext lives in the
/// blob store.
#[derive(Clone, PartialEq, Eq)]
pub struct NewRow {
    pub record_type: RecordType,
    pub metadata: String,
    pub payload: Option<Vec<u8>>,
}

/// A record row as read back, already scoped to its owner
#[derive(Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: RecordId,
    pub record_type: RecordType,
    pub metadata: String,
    pub payload: Option<Vec<u8>>,
}

impl std::fmt::Debug for NewRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewRow")
            .field("record_type", &self.record_type)
            .field("metadata", &self.metadata)
            .field("payload_len", &self.payload.as_ref().map(Vec::len))
            .finish()
    }
}

impl std::fmt::Debug for StoredRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredRow")
            .field("id", &self.id)
            .field("record_type", &self.record_type)
            .field("metadata", &self.metadata)
            .field("payload_len", &self.payload.as_ref().map(Vec::len))
            .finish()
    }
}

/// Users and record rows.
///
/// Every record query is scoped to `owner`: a row owned by someone else is
/// indistinguishable from a missing one (`NotFound`).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a user. A taken login is `Conflict`, decided atomically by
    /// the store.
    async fn create_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId>;

    /// Look up a user by login + hash. Any mismatch is `Authentication`.
    async fn authenticate_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId>;

    /// Insert a row owned by `owner`; the store assigns a fresh id
    async fn create(&self, owner: &UserId, row: NewRow) -> VaultResult<RecordId>;

    async fn get(&self, owner: &UserId, id: &RecordId) -> VaultResult<StoredRow>;

    /// Remove a row. `NotFound` if nothing owned by `owner` matched.
    async fn delete(&self, owner: &UserId, id: &RecordId) -> VaultResult<()>;

    async fn list_by_owner(&self, owner: &UserId) -> VaultResult<Vec<RecordInfo>>;

    /// Cheap reachability probe for readiness checks
    async fn ping(&self) -> VaultResult<()> {
        Ok(())
    }
}

pub(crate) fn new_record_id() -> RecordId {
    RecordId::new(uuid::Uuid::new_v4().to_string())
}

pub(crate) fn new_user_id() -> UserId {
    UserId::new(uuid::Uuid::new_v4().to_string())
}
