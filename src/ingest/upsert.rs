//! Keyed record writes and the derived user directory

use super::transform::UNASSIGNED;
use crate::model::{RecordKey, Role, SalesRecord, User};
use crate::store::{DocumentStore, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Counts reported after an upload is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub users_created: usize,
    pub users_updated: usize,
}

/// Replace a name with the casing used by a branch directory entry
fn canonical_name(branch_users: &[&User], name: &str) -> Option<String> {
    branch_users
        .iter()
        .find(|u| u.name_matches(name))
        .map(|u| u.name.clone())
}

fn normalize_names(records: &mut [SalesRecord], branch_users: &[&User]) {
    for record in records.iter_mut() {
        if let Some(name) = canonical_name(branch_users, &record.bde_name) {
            record.bde_name = name;
        }
        if record.team_leader != UNASSIGNED {
            if let Some(name) = canonical_name(branch_users, &record.team_leader) {
                record.team_name = name.clone();
                record.team_leader = name;
            }
        }
        if !record.dbm.is_empty() {
            if let Some(name) = canonical_name(branch_users, &record.dbm) {
                record.dbm = name;
            }
        }
    }
}

/// Highest sales role observed for each person in the records
fn derive_directory(records: &[SalesRecord]) -> Vec<(String, Role)> {
    let mut observed: Vec<(String, Role)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for record in records {
        let people = [
            (&record.dbm, Role::DeputyBranchManager),
            (&record.team_leader, Role::TeamLeader),
            (&record.bde_name, Role::BusinessDevelopmentExecutive),
        ];
        for (name, role) in people {
            if name.trim().is_empty() || name == UNASSIGNED {
                continue;
            }
            match position.get(name.as_str()) {
                Some(&i) => {
                    if role.hierarchy_rank() > observed[i].1.hierarchy_rank() {
                        observed[i].1 = role;
                    }
                }
                None => {
                    position.insert(name.clone(), observed.len());
                    observed.push((name.clone(), role));
                }
            }
        }
    }
    observed
}

/// Write uploaded records for `branch` and refresh the derived directory.
///
/// Existing directory entries keep their manual flags; a role is only ever
/// raised along DBM > TL > BDE and hand-assigned roles are left alone.
pub async fn write_records(
    store: &dyn DocumentStore,
    mut records: Vec<SalesRecord>,
    branch: &str,
) -> StoreResult<UpsertReport> {
    let users = store.users().await?;
    let branch_users: Vec<&User> = users.iter().filter(|u| u.branch == branch).collect();

    normalize_names(&mut records, &branch_users);
    let observed = derive_directory(&records);

    let counts = store.upsert_records(records).await?;
    let mut report = UpsertReport {
        inserted: counts.inserted,
        updated: counts.updated,
        ..UpsertReport::default()
    };

    for (name, role) in observed {
        match branch_users.iter().find(|u| u.name_matches(&name)) {
            Some(existing) => {
                let raise = existing.role.hierarchy_rank().is_some()
                    && role.hierarchy_rank() > existing.role.hierarchy_rank();
                if !raise && existing.has_performance_data {
                    continue;
                }
                let mut user = (*existing).clone();
                if raise {
                    info!(user = %user.name, from = %user.role, to = %role, "Raising directory role");
                    user.role = role;
                }
                user.has_performance_data = true;
                store.save_user(user).await?;
                report.users_updated += 1;
            }
            None => {
                debug!(user = %name, role = %role, branch, "Adding directory user");
                store.save_user(User::derived(&name, role, branch)).await?;
                report.users_created += 1;
            }
        }
    }

    info!(
        branch,
        inserted = report.inserted,
        updated = report.updated,
        users_created = report.users_created,
        users_updated = report.users_updated,
        "Records written"
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeptRecord {
    pub id: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupGroup {
    pub group: String,
    pub duplicate_count: usize,
    pub deleted_count: usize,
    pub kept_record: KeptRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub duplicate_groups_found: usize,
    pub total_records_deleted: usize,
    pub details: Vec<CleanupGroup>,
}

/// Collapse records sharing an upsert key, keeping the newest upload
pub async fn cleanup_duplicates(store: &dyn DocumentStore) -> StoreResult<CleanupReport> {
    let records = store.records().await?;
    let mut groups: BTreeMap<RecordKey, Vec<SalesRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.key()).or_default().push(record);
    }

    let mut report = CleanupReport::default();
    for (key, mut group) in groups.into_iter().filter(|(_, g)| g.len() > 1) {
        // Newest first; records without a timestamp count as oldest
        group.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        let kept = &group[0];
        let doomed: Vec<String> = group[1..].iter().map(|r| r.id.clone()).collect();
        let deleted = store.delete_records(&doomed).await?;

        info!(group = %key, duplicates = group.len(), deleted, "Duplicate group cleaned");
        report.duplicate_groups_found += 1;
        report.total_records_deleted += deleted;
        report.details.push(CleanupGroup {
            group: key.to_string(),
            duplicate_count: group.len(),
            deleted_count: deleted,
            kept_record: KeptRecord {
                id: kept.id.clone(),
                uploaded_at: kept.uploaded_at,
            },
        });
    }

    info!(
        groups = report.duplicate_groups_found,
        deleted = report.total_records_deleted,
        "Duplicate cleanup complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Month;
    use crate::store::MemoryStore;
    use crate::testing::fixtures::record;
    use chrono::Duration;

    const BRANCH: &str = "Hyderabad Branch";

    #[tokio::test]
    async fn test_names_take_directory_casing() {
        let store = MemoryStore::new();
        store
            .save_user(User::derived("Asha Rao", Role::BusinessDevelopmentExecutive, BRANCH))
            .await
            .unwrap();
        store
            .save_user(User::derived("Ravi", Role::TeamLeader, BRANCH))
            .await
            .unwrap();

        let mut rec = record("ASHA RAO", Month::May, BRANCH);
        rec.team_leader = "ravi".to_string();
        rec.team_name = "ravi".to_string();
        write_records(&store, vec![rec], BRANCH).await.unwrap();

        let stored = &store.records().await.unwrap()[0];
        assert_eq!(stored.bde_name, "Asha Rao");
        assert_eq!(stored.team_leader, "Ravi");
        assert_eq!(stored.team_name, "Ravi");
    }

    #[tokio::test]
    async fn test_directory_derived_with_highest_role() {
        let store = MemoryStore::new();
        let mut a = record("Asha", Month::May, BRANCH);
        a.team_leader = "Ravi".into();
        a.dbm = "Meera".into();
        let mut b = record("Ravi", Month::May, BRANCH);
        b.team_leader = "Meera".into();
        b.dbm = "Meera".into();

        let report = write_records(&store, vec![a, b], BRANCH).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.users_created, 3);
        let users = store.users().await.unwrap();
        let role_of = |n: &str| users.iter().find(|u| u.name == n).map(|u| u.role);
        assert_eq!(role_of("Meera"), Some(Role::DeputyBranchManager));
        assert_eq!(role_of("Ravi"), Some(Role::TeamLeader));
        assert_eq!(role_of("Asha"), Some(Role::BusinessDevelopmentExecutive));
    }

    #[tokio::test]
    async fn test_existing_users_keep_flags_and_roles_only_rise() {
        let store = MemoryStore::new();
        let mut inactive_tl = User::derived("Ravi", Role::TeamLeader, BRANCH);
        inactive_tl.inactive = true;
        store.save_user(inactive_tl).await.unwrap();
        store
            .save_user(User::derived("Vp Singh", Role::VicePresident, BRANCH))
            .await
            .unwrap();

        // Ravi appears only as a BDE, Vp Singh as a DBM
        let mut rec = record("Ravi", Month::May, BRANCH);
        rec.team_leader = UNASSIGNED.into();
        rec.dbm = "vp singh".into();
        write_records(&store, vec![rec], BRANCH).await.unwrap();

        let users = store.users().await.unwrap();
        let ravi = users.iter().find(|u| u.name == "Ravi").unwrap();
        assert_eq!(ravi.role, Role::TeamLeader);
        assert!(ravi.inactive);
        let vp = users.iter().find(|u| u.name == "Vp Singh").unwrap();
        assert_eq!(vp.role, Role::VicePresident);
        assert!(users.iter().all(|u| u.name != UNASSIGNED));
    }

    #[tokio::test]
    async fn test_reupload_updates_in_place() {
        let store = MemoryStore::new();
        write_records(&store, vec![record("Asha", Month::May, BRANCH)], BRANCH)
            .await
            .unwrap();

        let mut again = record("asha", Month::May, BRANCH);
        again.target = 50.0;
        let report = write_records(&store, vec![again], BRANCH).await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(report.users_created, 0);
        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, 50.0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_newest() {
        let now = Utc::now();
        let mut old = record("Asha", Month::May, BRANCH);
        old.uploaded_at = Some(now - Duration::days(2));
        let mut newest = record("Asha", Month::May, BRANCH);
        newest.uploaded_at = Some(now);
        let mut undated = record("Asha", Month::May, BRANCH);
        undated.uploaded_at = None;
        let other = record("Ravi", Month::May, BRANCH);

        // Legacy data can hold several records per key
        let store = MemoryStore::from_parts(vec![old, newest.clone(), undated, other], vec![], vec![]);

        let report = cleanup_duplicates(&store).await.unwrap();

        assert_eq!(report.duplicate_groups_found, 1);
        assert_eq!(report.total_records_deleted, 2);
        assert_eq!(report.details[0].kept_record.id, newest.id);
        assert_eq!(report.details[0].duplicate_count, 3);
        assert_eq!(report.details[0].group, "Asha | MAY | FY2025 | Hyderabad Branch");
        assert_eq!(store.records().await.unwrap().len(), 2);
    }
}
