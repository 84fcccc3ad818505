//! In-memory document store

use super::{
    DocumentStore, RecordEdit, RecordFilter, StoreResult, UpsertCounts, UserEdit, UserFilter,
};
use crate::model::{Drive, RecordKey, SalesRecord, User};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Documents {
    records: Vec<SalesRecord>,
    users: Vec<User>,
    drives: Vec<Drive>,
}

/// Document store kept in memory only; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing documents
    pub fn from_parts(records: Vec<SalesRecord>, users: Vec<User>, drives: Vec<Drive>) -> Self {
        Self {
            state: RwLock::new(Documents {
                records,
                users,
                drives,
            }),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn records(&self) -> StoreResult<Vec<SalesRecord>> {
        Ok(self.state.read().await.records.clone())
    }

    async fn upsert_records(&self, records: Vec<SalesRecord>) -> StoreResult<UpsertCounts> {
        let mut state = self.state.write().await;
        let mut index: HashMap<RecordKey, usize> = HashMap::new();
        for (i, existing) in state.records.iter().enumerate() {
            index.entry(existing.key()).or_insert(i);
        }

        let mut counts = UpsertCounts::default();
        for record in records {
            let key = record.key();
            match index.get(&key) {
                Some(&i) => {
                    state.records[i].overwrite_from(&record);
                    counts.updated += 1;
                }
                None => {
                    index.insert(key, state.records.len());
                    state.records.push(record);
                    counts.inserted += 1;
                }
            }
        }

        Ok(counts)
    }

    async fn update_records(
        &self,
        filter: &RecordFilter<'_>,
        edit: &RecordEdit<'_>,
    ) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let mut matched = 0;
        for record in state.records.iter_mut().filter(|r| filter(r)) {
            edit(record);
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete_records(&self, ids: &[String]) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|r| !ids.contains(&r.id));
        let removed = before - state.records.len();
        Ok(removed)
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn save_user(&self, user: User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => state.users.push(user),
        }
        Ok(())
    }

    async fn update_users(
        &self,
        filter: &UserFilter<'_>,
        edit: &UserEdit<'_>,
    ) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let mut matched = 0;
        for user in state.users.iter_mut().filter(|u| filter(u)) {
            edit(user);
            matched += 1;
        }
        Ok(matched)
    }

    async fn drives(&self) -> StoreResult<Vec<Drive>> {
        Ok(self.state.read().await.drives.clone())
    }

    async fn insert_drive(&self, drive: Drive) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.drives.push(drive);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }
}
