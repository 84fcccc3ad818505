//! Mock implementations for testing

use crate::model::{Drive, SalesRecord, User};
use crate::notify::{AccessLink, Notifier};
use crate::store::{
    DocumentStore, MemoryStore, RecordEdit, RecordFilter, StoreError, StoreResult, UpsertCounts,
    UserEdit, UserFilter,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Store that reports itself unavailable.
///
/// By default every call fails; [`FailingStore::writes_only`] lets reads
/// through to an inner [`MemoryStore`] so failures surface mid-operation.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: bool,
    pub failed_calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_reads: true,
            failed_calls: AtomicUsize::new(0),
        }
    }

    pub fn writes_only(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: false,
            failed_calls: AtomicUsize::new(0),
        }
    }

    fn fail<T>(&self, operation: &str) -> StoreResult<T> {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        Err(StoreError::Unavailable(format!("{operation} rejected by mock")))
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn records(&self) -> StoreResult<Vec<SalesRecord>> {
        if self.fail_reads {
            return self.fail("records");
        }
        self.inner.records().await
    }

    async fn upsert_records(&self, _records: Vec<SalesRecord>) -> StoreResult<UpsertCounts> {
        self.fail("upsert_records")
    }

    async fn update_records(
        &self,
        _filter: &RecordFilter<'_>,
        _edit: &RecordEdit<'_>,
    ) -> StoreResult<usize> {
        self.fail("update_records")
    }

    async fn delete_records(&self, _ids: &[String]) -> StoreResult<usize> {
        self.fail("delete_records")
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        if self.fail_reads {
            return self.fail("users");
        }
        self.inner.users().await
    }

    async fn save_user(&self, _user: User) -> StoreResult<()> {
        self.fail("save_user")
    }

    async fn update_users(
        &self,
        _filter: &UserFilter<'_>,
        _edit: &UserEdit<'_>,
    ) -> StoreResult<usize> {
        self.fail("update_users")
    }

    async fn drives(&self) -> StoreResult<Vec<Drive>> {
        if self.fail_reads {
            return self.fail("drives");
        }
        self.inner.drives().await
    }

    async fn insert_drive(&self, _drive: Drive) -> StoreResult<()> {
        self.fail("insert_drive")
    }

    async fn health_check(&self) -> StoreResult<()> {
        if self.fail_reads {
            return self.fail("health_check");
        }
        Ok(())
    }
}


/// Notifier that keeps every link it is handed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AccessLink>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<AccessLink> {
        self.sent.lock().map(|links| links.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, link: &AccessLink) {
        if let Ok(mut links) = self.sent.lock() {
            links.push(link.clone());
        }
    }
}
