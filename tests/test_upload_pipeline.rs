//! Upload pipeline from raw bytes to stored records and directory users

mod test_helpers;

use salespulse::error::DashboardError;
use salespulse::ingest::UploadRequest;
use salespulse::model::{Month, Role};
use salespulse::store::{DocumentStore, MemoryStore, SqliteStore};
use salespulse::testing::fixtures::{sample_csv, test_config, user, HYDERABAD, MUMBAI};
use salespulse::Dashboard;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::test_dashboard;

fn csv_upload(body: &str, branch: &str) -> UploadRequest {
    UploadRequest {
        file_name: "performance.csv".to_string(),
        mime: Some("text/csv".to_string()),
        bytes: body.as_bytes().to_vec(),
        branch: branch.to_string(),
    }
}

#[tokio::test]
async fn test_upload_stores_records_and_derives_directory() {
    let dashboard = test_dashboard(vec![], vec![]);
    let report = dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();

    assert_eq!(report.message, "Successfully uploaded 2 records to Hyderabad Branch");
    assert_eq!(report.upsert.inserted, 2);
    assert_eq!(report.upsert.users_created, 4);
    assert_eq!(report.rejected_rows.as_ref().map(Vec::len), Some(1));

    let records = dashboard.store().records().await.unwrap();
    let vikram = records.iter().find(|r| r.bde_name == "Vikram").unwrap();
    assert_eq!(vikram.month, Month::May);
    assert_eq!(vikram.target, 1000.0);
    assert_eq!(vikram.achievement_pct, 25.0);
    assert_eq!(vikram.team_name, "Ravi");
    assert_eq!(vikram.drive, "2025 Performance");

    let users = dashboard.store().users().await.unwrap();
    let role_of = |name: &str| users.iter().find(|u| u.name == name).map(|u| u.role);
    assert_eq!(role_of("Meera"), Some(Role::DeputyBranchManager));
    assert_eq!(role_of("Ravi"), Some(Role::TeamLeader));
    assert_eq!(role_of("Asha"), Some(Role::BusinessDevelopmentExecutive));
    assert!(users.iter().all(|u| u.branch == HYDERABAD && u.has_performance_data));
}

#[tokio::test]
async fn test_reupload_updates_in_place() {
    let dashboard = test_dashboard(vec![], vec![]);
    dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();

    let revised = sample_csv().replace("2025,April,Meera,Ravi,Asha,10,8,9,6,1,1,7.5,75", "2025,April,Meera,Ravi,Asha,10,8,9,6,1,1,10,100");
    let report = dashboard.upload(csv_upload(&revised, HYDERABAD)).await.unwrap();

    assert_eq!(report.upsert.inserted, 0);
    assert_eq!(report.upsert.updated, 2);
    assert_eq!(report.upsert.users_created, 0);

    let records = dashboard.store().records().await.unwrap();
    assert_eq!(records.len(), 2);
    let asha = records.iter().find(|r| r.bde_name == "Asha").unwrap();
    assert_eq!(asha.closed_points, 10.0);
    assert_eq!(asha.achievement_pct, 100.0);
}

#[tokio::test]
async fn test_same_people_in_two_branches_stay_separate() {
    let dashboard = test_dashboard(vec![], vec![]);
    dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();
    let report = dashboard.upload(csv_upload(&sample_csv(), MUMBAI)).await.unwrap();

    assert_eq!(report.upsert.inserted, 2);
    assert_eq!(report.upsert.users_created, 4);
    assert_eq!(dashboard.store().records().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_names_follow_directory_casing() {
    let mut manual = user("ASHA", Role::TeamLeader, HYDERABAD);
    manual.has_performance_data = true;
    let dashboard = test_dashboard(vec![], vec![manual]);

    let report = dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();
    assert_eq!(report.upsert.users_created, 3);

    let records = dashboard.store().records().await.unwrap();
    assert!(records.iter().any(|r| r.bde_name == "ASHA"));

    let users = dashboard.store().users().await.unwrap();
    let asha = users.iter().find(|u| u.name == "ASHA").unwrap();
    assert_eq!(asha.role, Role::TeamLeader);
}

#[tokio::test]
async fn test_upload_with_only_bad_rows_is_rejected() {
    let dashboard = test_dashboard(vec![], vec![]);
    let body = [
        "FY,Month,DBM,Team Leader,BDE,Target,Admissions,Points,Closed Admissions,\
         Cancellation/backout,Incomplete Form,Closed Point,Target %",
        "2025,Smarch,Meera,Ravi,Kiran,5,5,5,5,0,0,5,100",
    ]
    .join("\n");

    let err = dashboard.upload(csv_upload(&body, HYDERABAD)).await.unwrap_err();
    match err {
        DashboardError::NoValidRows { rejected, summary } => {
            assert_eq!(rejected.len(), 1);
            assert_eq!(summary.success_count, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dashboard.store().records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_requires_branch() {
    let dashboard = test_dashboard(vec![], vec![]);
    let err = dashboard.upload(csv_upload(&sample_csv(), "  ")).await.unwrap_err();
    assert_eq!(err.to_error_body().error, "Branch name not provided");
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let dashboard = test_dashboard(vec![], vec![]);
    let mut request = csv_upload(&sample_csv(), HYDERABAD);
    request.file_name = "notes.txt".to_string();
    request.mime = Some("text/plain".to_string());

    let err = dashboard.upload(request).await.unwrap_err();
    assert_eq!(err.status_code(), warp::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_uploads_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("salespulse.db");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        let dashboard = Dashboard::new(Arc::new(store), test_config());
        dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();
    }
    assert!(path.exists());

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(reopened.records().await.unwrap().len(), 2);
    assert_eq!(reopened.users().await.unwrap().len(), 4);

    let dashboard = Dashboard::new(Arc::new(reopened), test_config());
    let report = dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();
    assert_eq!(report.upsert.updated, 2);
}

#[tokio::test]
async fn test_duplicate_cleanup_after_legacy_data() {
    let dashboard = test_dashboard(vec![], vec![]);
    dashboard.upload(csv_upload(&sample_csv(), HYDERABAD)).await.unwrap();

    let records = dashboard.store().records().await.unwrap();
    let mut legacy = records[0].clone();
    legacy.id = "legacy".to_string();
    legacy.uploaded_at = None;
    let store = MemoryStore::from_parts(
        records.into_iter().chain(std::iter::once(legacy)).collect(),
        vec![],
        vec![],
    );
    let dashboard = Dashboard::new(Arc::new(store), test_config());

    let report = dashboard.cleanup_duplicates().await.unwrap();
    assert_eq!(report.duplicate_groups_found, 1);
    assert_eq!(report.total_records_deleted, 1);
    let remaining = dashboard.store().records().await.unwrap();
    assert!(remaining.iter().all(|r| r.id != "legacy"));
}
