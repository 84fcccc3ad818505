//! Persistence layer for records, users and drives
//!
//! The service talks to storage through [`DocumentStore`]. [`SqliteStore`]
//! persists to a database file; [`MemoryStore`] keeps everything in memory for
//! tests and throwaway runs.

use crate::model::{Drive, SalesRecord, User};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Predicate selecting sales records
pub type RecordFilter<'a> = dyn Fn(&SalesRecord) -> bool + Send + Sync + 'a;
/// In-place edit applied to each selected record
pub type RecordEdit<'a> = dyn Fn(&mut SalesRecord) + Send + Sync + 'a;
/// Predicate selecting users
pub type UserFilter<'a> = dyn Fn(&User) -> bool + Send + Sync + 'a;
/// In-place edit applied to each selected user
pub type UserEdit<'a> = dyn Fn(&mut User) + Send + Sync + 'a;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Document encoding error: {0}")]
    Document(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counts from a keyed record upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Document storage used by the dashboard service
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// All sales records
    async fn records(&self) -> StoreResult<Vec<SalesRecord>>;

    /// Upsert on `(bde_name, month, fy, branch)`: a matching record is
    /// overwritten in place, otherwise the record is inserted
    async fn upsert_records(&self, records: Vec<SalesRecord>) -> StoreResult<UpsertCounts>;

    /// Apply `edit` to every record matching `filter`, returning the match count
    async fn update_records(
        &self,
        filter: &RecordFilter<'_>,
        edit: &RecordEdit<'_>,
    ) -> StoreResult<usize>;

    /// Delete records by id, returning the number removed
    async fn delete_records(&self, ids: &[String]) -> StoreResult<usize>;

    /// All directory users
    async fn users(&self) -> StoreResult<Vec<User>>;

    /// Insert a user, or replace the user with the same id
    async fn save_user(&self, user: User) -> StoreResult<()>;

    /// Apply `edit` to every user matching `filter`, returning the match count
    async fn update_users(&self, filter: &UserFilter<'_>, edit: &UserEdit<'_>)
        -> StoreResult<usize>;

    async fn drives(&self) -> StoreResult<Vec<Drive>>;

    async fn insert_drive(&self, drive: Drive) -> StoreResult<()>;

    /// Cheap liveness probe used by the health endpoint
    async fn health_check(&self) -> StoreResult<()>;
}
