//! SQLite-backed metadata store via sqlx

use anyhow::Context;
use async_trait::async_trait;
use keepsafe_core::{RecordId, RecordInfo, RecordType, UserId, VaultError, VaultResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, error};

use crate::metadata::{new_record_id, new_user_id, MetadataStore, NewRow, StoredRow};

/// Metadata store over a sqlx SQLite pool. Cheap to clone.
#[derive(Clone)]
pub struct SqlMetadataStore {
    pool: SqlitePool,
}

impl SqlMetadataStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// WAL and foreign keys are set per connection, not in a migration:
    /// SQLite refuses to change `journal_mode` inside a transaction.
    pub async fn open(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let in_memory = url.contains(":memory:");
        let mut opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("parsing database url: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            opts = opts.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to :memory: is its own database; pin the pool to one.
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_opts
            .connect_with(opts)
            .await
            .with_context(|| format!("opening metadata database: {url}"))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running metadata migrations")?;

        debug!(url, "metadata store ready");
        Ok(Self { pool })
    }

    /// Private in-memory database, for tests and throwaway servers
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        Self::open("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(op: &'static str, e: sqlx::Error) -> VaultError {
    error!(op, error = %e, "metadata store query failed");
    VaultError::storage(format!("{op}: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn decode_type(tag: i64) -> VaultResult<RecordType> {
    let tag = i32::try_from(tag)
        .map_err(|_| VaultError::storage(format!("record_type out of range: {tag}")))?;
    RecordType::from_tag(tag)
        .map_err(|_| VaultError::storage(format!("unknown record_type in store: {tag}")))
}

fn decode_payload(payload_hex: Option<String>) -> VaultResult<Option<Vec<u8>>> {
    payload_hex
        .map(|h| hex::decode(h).map_err(|e| VaultError::storage(format!("corrupt payload_hex: {e}"))))
        .transpose()
}

#[async_trait]
impl MetadataStore for SqlMetadataStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId> {
        let user_id = new_user_id();
        let result = sqlx::query("INSERT INTO users (user_id, login, password_hash) VALUES (?, ?, ?)")
            .bind(user_id.as_str())
            .bind(login)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(user_id),
            Err(e) if is_unique_violation(&e) => {
                Err(VaultError::Conflict(format!("login already registered: {login}")))
            }
            Err(e) => Err(db_err("create_user", e)),
        }
    }

    async fn authenticate_user(&self, login: &str, password_hash: &str) -> VaultResult<UserId> {
        let user_id: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM users WHERE login = ? AND password_hash = ?")
                .bind(login)
                .bind(password_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_err("authenticate_user", e))?;

        user_id
            .map(UserId::new)
            .ok_or_else(|| VaultError::unauthenticated("invalid login or password"))
    }

    async fn create(&self, owner: &UserId, row: NewRow) -> VaultResult<RecordId> {
        let id = new_record_id();
        sqlx::query(
            "INSERT INTO records (record_id, owner_user_id, record_type, metadata, payload_hex) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(owner.as_str())
        .bind(i64::from(row.record_type.tag()))
        .bind(&row.metadata)
        .bind(row.payload.as_deref().map(hex::encode))
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("create", e))?;

        Ok(id)
    }

    async fn get(&self, owner: &UserId, id: &RecordId) -> VaultResult<StoredRow> {
        let row: Option<(i64, String, Option<String>)> = sqlx::query_as(
            "SELECT record_type, metadata, payload_hex FROM records \
             WHERE record_id = ? AND owner_user_id = ?",
        )
        .bind(id.as_str())
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get", e))?;

        let (tag, metadata, payload_hex) =
            row.ok_or_else(|| VaultError::NotFound(format!("record {id}")))?;

        Ok(StoredRow {
            id: id.clone(),
            record_type: decode_type(tag)?,
            metadata,
            payload: decode_payload(payload_hex)?,
        })
    }

    async fn delete(&self, owner: &UserId, id: &RecordId) -> VaultResult<()> {
        let result = sqlx::query("DELETE FROM records WHERE record_id = ? AND owner_user_id = ?")
            .bind(id.as_str())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("record {id}")));
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner: &UserId) -> VaultResult<Vec<RecordInfo>> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT record_id, record_type, metadata FROM records \
             WHERE owner_user_id = ? ORDER BY rowid",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list_by_owner", e))?;

        rows.into_iter()
            .map(|(id, tag, metadata)| {
                Ok(RecordInfo {
                    id: RecordId::new(id),
                    record_type: decode_type(tag)?,
                    metadata,
                })
            })
            .collect()
    }

    async fn ping(&self) -> VaultResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| db_err("ping", e))
    }
}
