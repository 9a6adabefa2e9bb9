//! In-process metadata store for tests and single-node dev servers

use async_trait::async_trait;
use keepsafe_core::{RecordId, RecordInfo, UserId, VaultError, VaultResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::metadata::{new_record_id, new_user_id, MetadataStore, NewRow, StoredRow};

struct UserEntry {
    user_id: UserId,
    password_hash: String,
}

struct RecordEntry {
    owner: UserId,
    row: StoredRow,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserEntry>,
    // Vec keeps listing in insertion order
    records: Vec<RecordEntry>,
}

/// Same semantics as the SQL store, held behind one `RwLock`.
///
/// Login uniqueness is decided under the write lock.
#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(login) {
            return Err(VaultError::Conflict(format!("login already registered: {login}")));
        }
        let user_id = new_user_id();
        inner.users.insert(
            login.to_string(),
            UserEntry {
                user_id: user_id.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user_id)
    }

    async fn authenticate_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId> {
        let inner = self.inner.read().await;
        match inner.users.get(login) {
            Some(entry) if entry.password_hash == password_hash => Ok(entry.user_id.clone()),
            _ => Err(VaultError::unauthenticated("invalid login or password")),
        }
    }

    async fn create(&self, owner: &UserId, row: NewRow) -> VaultResult<RecordId> {
        let mut inner = self.inner.write().await;
        if !inner.users.values().any(|u| &u.user_id == owner) {
            return Err(VaultError::storage(format!("unknown owner {owner}")));
        }
        let id = new_record_id();
        inner.records.push(RecordEntry {
            owner: owner.clone(),
            row: StoredRow {
                id: id.clone(),
                record_type: row.record_type,
                metadata: row.metadata,
                payload: row.payload,
            },
        });
        Ok(id)
    }

    async fn get(&self, owner: &UserId, id: &RecordId) -> VaultResult<StoredRow> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .find(|e| &e.owner == owner && &e.row.id == id)
            .map(|e| e.row.clone())
            .ok_or_else(|| VaultError::NotFound(format!("record {id}")))
    }

    async fn delete(&self, owner: &UserId, id: &RecordId) -> VaultResult<()> {
        let mut inner = self.inner.write().await;
        let pos = inner
            .records
            .iter()
            .position(|e| &e.owner == owner && &e.row.id == id)
            .ok_or_else(|| VaultError::NotFound(format!("record {id}")))?;
        inner.records.remove(pos);
        Ok(())
    }

    async fn list_by_owner(&self, owner: &UserId) -> VaultResult<Vec<RecordInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|e| &e.owner == owner)
            .map(|e| RecordInfo {
                id: e.row.id.clone(),
                record_type: e.row.record_type,
                metadata: e.row.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsafe_core::RecordType;
    use std::sync::Arc;

    fn row(metadata: &str) -> NewRow {
        NewRow {
            record_type: RecordType::LoginPassword,
            metadata: metadata.into(),
            payload: Some(b"ct".to_vec()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_login_conflicts() {
        let store = MemoryMetadataStore::new();
        store.create_user("alice", "h").await.unwrap();
        assert!(matches!(
            store.create_user("alice", "h").await,
            Err(VaultError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let store = Arc::new(MemoryMetadataStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_user("racer", "h").await })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(VaultError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_ownership_scoping() {
        let store = MemoryMetadataStore::new();
        let alice = store.create_user("alice", "h").await.unwrap();
        let bob = store.create_user("bob", "h").await.unwrap();
        let id = store.create(&alice, row("site")).await.unwrap();

        assert!(matches!(store.get(&bob, &id).await, Err(VaultError::NotFound(_))));
        assert!(matches!(store.delete(&bob, &id).await, Err(VaultError::NotFound(_))));
        assert_eq!(store.get(&alice, &id).await.unwrap().metadata, "site");
    }

    #[tokio::test]
    async fn test_distinct_ids_for_duplicate_creates() {
        let store = MemoryMetadataStore::new();
        let owner = store.create_user("alice", "h").await.unwrap();
        let a = store.create(&owner, row("same")).await.unwrap();
        let b = store.create(&owner, row("same")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list_by_owner(&owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let store = MemoryMetadataStore::new();
        let owner = store.create_user("alice", "h").await.unwrap();
        let id = store.create(&owner, row("x")).await.unwrap();
        store.delete(&owner, &id).await.unwrap();
        assert!(matches!(store.get(&owner, &id).await, Err(VaultError::NotFound(_))));
    }
}
