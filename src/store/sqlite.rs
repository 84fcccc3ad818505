//! SQLite document store
//!
//! Each document is kept as JSON next to the columns that identify it. Sales
//! records carry a unique index on `(bde_name, month, fy, branch)`, so the
//! keyed upsert of a whole upload runs as one transaction and two rows can
//! never share a key.
//!
//! `rusqlite` is synchronous: statements run on the blocking pool against a
//! connection held behind a `std::sync::Mutex`. Read-modify-write operations
//! additionally hold `writer` so the documents they read cannot change before
//! their edits are written back.

use super::{
    DocumentStore, RecordEdit, RecordFilter, StoreError, StoreResult, UpsertCounts, UserEdit,
    UserFilter,
};
use crate::model::{Drive, SalesRecord, User};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sales_records (
    id       TEXT PRIMARY KEY,
    bde_name TEXT NOT NULL,
    month    TEXT NOT NULL,
    fy       TEXT NOT NULL,
    branch   TEXT NOT NULL,
    doc      TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sales_records_key
    ON sales_records (bde_name, month, fy, branch);

CREATE TABLE IF NOT EXISTS users (
    id   TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    doc  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS drives (
    id  TEXT PRIMARY KEY,
    doc TEXT NOT NULL
);
";

/// Document store persisted in a SQLite database file
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    writer: tokio::sync::Mutex<()>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(join_error)??;

        let store = Self::from_connection(conn, Some(path));
        let (records, users) = store
            .run(|conn| Ok((count(conn, "sales_records")?, count(conn, "users")?)))
            .await?;
        info!(
            path = %store.path.as_deref().unwrap_or(Path::new(":memory:")).display(),
            records,
            users,
            "Opened database"
        );
        Ok(store)
    }

    /// Private in-memory database with the same schema
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            writer: tokio::sync::Mutex::new(()),
            path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `op` against the connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("database connection poisoned".into()))?;
            op(&mut *guard)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(e: tokio::task::JoinError) -> StoreError {
    StoreError::Unavailable(format!("database task failed: {e}"))
}

fn count(conn: &Connection, table: &str) -> StoreResult<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(usize::try_from(n).unwrap_or_default())
}

fn load_docs<T: DeserializeOwned>(conn: &Connection, sql: &str) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(serde_json::from_str(&row?)?);
    }
    Ok(docs)
}

fn write_record(tx: &Transaction<'_>, record: &SalesRecord) -> StoreResult<()> {
    tx.execute(
        "INSERT INTO sales_records (id, bde_name, month, fy, branch, doc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            bde_name = excluded.bde_name,
            month = excluded.month,
            fy = excluded.fy,
            branch = excluded.branch,
            doc = excluded.doc",
        params![
            record.id,
            record.bde_name,
            record.month.to_string(),
            record.fy,
            record.branch,
            serde_json::to_string(record)?
        ],
    )?;
    Ok(())
}

fn write_user(tx: &Transaction<'_>, user: &User) -> StoreResult<()> {
    tx.execute(
        "INSERT INTO users (id, name, doc) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, doc = excluded.doc",
        params![user.id, user.name, serde_json::to_string(user)?],
    )?;
    Ok(())
}

fn upsert_keyed(conn: &mut Connection, records: Vec<SalesRecord>) -> StoreResult<UpsertCounts> {
    let tx = conn.transaction()?;
    let mut counts = UpsertCounts::default();
    for record in records {
        let existing: Option<String> = tx
            .query_row(
                "SELECT doc FROM sales_records
                 WHERE bde_name = ?1 AND month = ?2 AND fy = ?3 AND branch = ?4",
                params![record.bde_name, record.month.to_string(), record.fy, record.branch],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(doc) => {
                let mut stored: SalesRecord = serde_json::from_str(&doc)?;
                stored.overwrite_from(&record);
                write_record(&tx, &stored)?;
                counts.updated += 1;
            }
            None => {
                write_record(&tx, &record)?;
                counts.inserted += 1;
            }
        }
    }
    tx.commit()?;
    Ok(counts)
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    async fn records(&self) -> StoreResult<Vec<SalesRecord>> {
        self.run(|conn| load_docs(conn, "SELECT doc FROM sales_records ORDER BY rowid"))
            .await
    }

    async fn upsert_records(&self, records: Vec<SalesRecord>) -> StoreResult<UpsertCounts> {
        let _writer = self.writer.lock().await;
        let counts = self.run(move |conn| upsert_keyed(conn, records)).await?;
        debug!(
            inserted = counts.inserted,
            updated = counts.updated,
            "Upserted sales records"
        );
        Ok(counts)
    }

    async fn update_records(
        &self,
        filter: &RecordFilter<'_>,
        edit: &RecordEdit<'_>,
    ) -> StoreResult<usize> {
        let _writer = self.writer.lock().await;
        let mut selected: Vec<SalesRecord> = self.records().await?;
        selected.retain(|r| filter(r));
        if selected.is_empty() {
            return Ok(0);
        }
        selected.iter_mut().for_each(|r| edit(r));

        let matched = selected.len();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for record in &selected {
                write_record(&tx, record)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        Ok(matched)
    }

    async fn delete_records(&self, ids: &[String]) -> StoreResult<usize> {
        let _writer = self.writer.lock().await;
        let ids = ids.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for id in &ids {
                removed += tx.execute("DELETE FROM sales_records WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        self.run(|conn| load_docs(conn, "SELECT doc FROM users ORDER BY rowid"))
            .await
    }

    async fn save_user(&self, user: User) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            write_user(&tx, &user)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_users(
        &self,
        filter: &UserFilter<'_>,
        edit: &UserEdit<'_>,
    ) -> StoreResult<usize> {
        let _writer = self.writer.lock().await;
        let mut selected: Vec<User> = self.users().await?;
        selected.retain(|u| filter(u));
        if selected.is_empty() {
            return Ok(0);
        }
        selected.iter_mut().for_each(|u| edit(u));

        let matched = selected.len();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for user in &selected {
                write_user(&tx, user)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        Ok(matched)
    }

    async fn drives(&self) -> StoreResult<Vec<Drive>> {
        self.run(|conn| load_docs(conn, "SELECT doc FROM drives ORDER BY rowid"))
            .await
    }

    async fn insert_drive(&self, drive: Drive) -> StoreResult<()> {
        let _writer = self.writer.lock().await;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO drives (id, doc) VALUES (?1, ?2)",
                params![drive.id, serde_json::to_string(&drive)?],
            )?;
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Month, Role};
    use crate::testing::fixtures::record;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut first = record("Asha", Month::May, "Hyderabad Branch");
        first.is_current_team_member = Some(false);
        let counts = store.upsert_records(vec![first.clone()]).await.unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 0 });

        let mut second = record("Asha", Month::May, "Hyderabad Branch");
        second.target = 42.0;
        let counts = store.upsert_records(vec![second]).await.unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 0, updated: 1 });

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[0].target, 42.0);
        assert_eq!(records[0].is_current_team_member, Some(false));
    }

    #[tokio::test]
    async fn test_key_includes_branch_month_and_fy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut next_year = record("Asha", Month::May, "Hyderabad Branch");
        next_year.fy = "2026".into();
        let counts = store
            .upsert_records(vec![
                record("Asha", Month::May, "Hyderabad Branch"),
                record("Asha", Month::May, "Mumbai Branch"),
                record("Asha", Month::June, "Hyderabad Branch"),
                next_year,
            ])
            .await
            .unwrap();

        assert_eq!(counts.inserted, 4);
        assert_eq!(store.records().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_repeated_key_in_one_batch_updates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut revised = record("Asha", Month::May, "Hyderabad Branch");
        revised.closed_points = 9.0;

        let counts = store
            .upsert_records(vec![record("Asha", Month::May, "Hyderabad Branch"), revised])
            .await
            .unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 1 });

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].closed_points, 9.0);
    }

    #[tokio::test]
    async fn test_update_and_delete_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let keep = record("Asha", Month::May, "Hyderabad Branch");
        let drop = record("Vikram", Month::May, "Hyderabad Branch");
        store
            .upsert_records(vec![keep.clone(), drop.clone()])
            .await
            .unwrap();

        let matched = store
            .update_records(&|r| r.bde_name == "Asha", &|r| r.team_name = "Falcons".into())
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let none = store
            .update_records(&|r| r.bde_name == "Nobody", &|r| r.target = 0.0)
            .await
            .unwrap();
        assert_eq!(none, 0);

        let removed = store
            .delete_records(&[drop.id.clone(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].team_name, "Falcons");
    }

    #[tokio::test]
    async fn test_edited_key_columns_follow_the_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_records(vec![record("asha", Month::May, "Hyderabad Branch")])
            .await
            .unwrap();
        store
            .update_records(&|r| r.bde_name == "asha", &|r| r.bde_name = "Asha".into())
            .await
            .unwrap();

        let counts = store
            .upsert_records(vec![record("Asha", Month::May, "Hyderabad Branch")])
            .await
            .unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 0, updated: 1 });
    }

    #[tokio::test]
    async fn test_users_and_drives() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut user = User::derived("Ravi", Role::BusinessDevelopmentExecutive, "Mumbai Branch");
        store.save_user(user.clone()).await.unwrap();

        user.role = Role::TeamLeader;
        user.password_hash = Some("hash".into());
        store.save_user(user.clone()).await.unwrap();

        let matched = store
            .update_users(&|u| u.name == "Ravi", &|u| u.inactive = true)
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let users = store.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::TeamLeader);
        assert_eq!(users[0].password_hash.as_deref(), Some("hash"));
        assert!(users[0].inactive);

        let drive = Drive {
            id: "drive-1".into(),
            name: "Summer Push".into(),
            start_month: 4,
            start_year: 2025,
            end_month: 6,
            end_year: 2025,
            created_at: chrono::Utc::now(),
        };
        store.insert_drive(drive.clone()).await.unwrap();
        assert_eq!(store.drives().await.unwrap(), vec![drive]);
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_database_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("salespulse.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .upsert_records(vec![record("Asha", Month::May, "Hyderabad Branch")])
                .await
                .unwrap();
            store
                .save_user(User::derived("Asha", Role::BusinessDevelopmentExecutive, "Hyderabad Branch"))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(reopened.records().await.unwrap().len(), 1);
        assert_eq!(reopened.users().await.unwrap()[0].name, "Asha");
    }

    #[tokio::test]
    async fn test_not_a_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        assert!(SqliteStore::open(&path).await.is_err());
    }
}
