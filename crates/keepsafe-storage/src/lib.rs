//! keepsafe-storage: the two stores the record router composes
//!
//! - [`MetadataStore`]: users and record rows (sqlx SQLite, or in-memory)
//! - [`BlobStore`]: file ciphertext keyed by record id (OpenDAL)

pub mod blob;
pub mod health;
pub mod memory;
pub mod metadata;
pub mod sql;

pub use blob::{BlobStore, OperatorBlobStore};
pub use health::check_health;
pub use memory::MemoryMetadataStore;
pub use metadata::{MetadataStore, NewRow, StoredRow};
pub use sql::SqlMetadataStore;
