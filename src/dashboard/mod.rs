//! Service facade behind the HTTP API and the CLI
//!
//! [`Dashboard`] owns the store, sessions and settings, and exposes one method
//! per operation. Writes are serialized through a single lock so an upload
//! and a record edit never interleave.

mod records;
pub mod types;
mod users;

pub use types::*;

use crate::access::{self, Viewer};
use crate::analytics::{
    self, BdeSummary, ChartPoint, Kpi, RecordScope, TeamSummary, TopAchiever,
};
use crate::auth::{PasswordHasher, SessionStore};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::ingest::{self, upsert, UploadReport, UploadRequest, UploadSettings};
use crate::model::{RecordView, SalesRecord, User};
use crate::notify::{LogNotifier, Notifier};
use crate::store::DocumentStore;
use crate::upload_span;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Instrument};

pub struct Dashboard {
    store: Arc<dyn DocumentStore>,
    config: Arc<DashboardConfig>,
    sessions: SessionStore,
    hasher: PasswordHasher,
    notifier: Arc<dyn Notifier>,
    writes: Mutex<()>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn DocumentStore>, config: DashboardConfig) -> Self {
        let session_ttl = Duration::seconds(secs(config.auth.session_ttl_secs));
        Self {
            store,
            sessions: SessionStore::new(session_ttl),
            hasher: PasswordHasher::new(config.auth.pbkdf2_iterations),
            config: Arc::new(config),
            notifier: Arc::new(LogNotifier),
            writes: Mutex::new(()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            drive_name: self.config.upload.drive_name.clone(),
            default_fiscal_year: self.config.upload.default_fiscal_year.clone(),
        }
    }

    /// Resolve the caller from an optional bearer token.
    ///
    /// A token that does not resolve is always rejected; a missing token is
    /// only rejected when sessions are required.
    pub async fn viewer(&self, token: Option<&str>) -> DashboardResult<Option<Viewer>> {
        match token {
            Some(token) => match self.sessions.resolve(token).await {
                Some(viewer) => Ok(Some(viewer)),
                None => Err(DashboardError::unauthorized("Session expired or invalid")),
            },
            None if self.config.auth.require_session => {
                Err(DashboardError::unauthorized("Login required"))
            }
            None => Ok(None),
        }
    }

    /// Gate for directory and record administration.
    ///
    /// A presented token must belong to a full-access role; a missing token
    /// passes only while sessions are optional.
    pub async fn require_admin(&self, token: Option<&str>) -> DashboardResult<()> {
        match self.viewer(token).await? {
            Some(viewer) if !viewer.role.is_full_access() => {
                Err(DashboardError::forbidden("Admin access required"))
            }
            _ => Ok(()),
        }
    }

    /// Every record joined with its BDE's directory entry
    pub async fn record_views(&self) -> DashboardResult<Vec<RecordView>> {
        let records = self.store.records().await?;
        let users = self.store.users().await?;
        Ok(join_records(records, &users))
    }

    /// Records for `/api/data`; an empty store is reported as not found
    pub async fn data(&self, viewer: Option<&Viewer>) -> DashboardResult<Vec<RecordView>> {
        let views = self.record_views().await?;
        if views.is_empty() {
            return Err(DashboardError::not_found(
                "Data not in database. Please upload data first.",
            ));
        }
        Ok(access::filter_records(views, viewer))
    }

    /// Records `viewer` may aggregate over
    pub async fn visible_records(&self, viewer: Option<&Viewer>) -> DashboardResult<Vec<RecordView>> {
        Ok(access::filter_records(self.record_views().await?, viewer))
    }

    pub async fn upload(&self, request: UploadRequest) -> DashboardResult<UploadReport> {
        let limit = self.config.upload.max_bytes;
        if request.bytes.len() as u64 > limit {
            return Err(DashboardError::invalid_input(format!(
                "File exceeds the {limit} byte upload limit"
            )));
        }

        let span = upload_span!(file = %request.file_name, branch = %request.branch);
        async {
            let _guard = self.writes.lock().await;
            ingest::process_upload(self.store.as_ref(), request, &self.upload_settings()).await
        }
        .instrument(span)
        .await
    }

    pub async fn cleanup_duplicates(&self) -> DashboardResult<CleanupResponse> {
        let _guard = self.writes.lock().await;
        let report = upsert::cleanup_duplicates(self.store.as_ref()).await?;
        Ok(CleanupResponse {
            success: true,
            message: "Duplicate cleanup completed".to_string(),
            duplicate_groups_found: report.duplicate_groups_found,
            total_records_deleted: report.total_records_deleted,
            details: report.details,
        })
    }

    pub async fn kpis(&self, viewer: Option<&Viewer>, scope: &RecordScope) -> DashboardResult<Vec<Kpi>> {
        let records = self.visible_records(viewer).await?;
        Ok(analytics::kpis(&records, scope.month, scope.branch.as_deref()))
    }

    /// Monthly chart of one BDE, for viewers allowed to open it
    pub async fn bde_chart(
        &self,
        viewer: Option<&Viewer>,
        bde_name: &str,
    ) -> DashboardResult<Vec<ChartPoint>> {
        let records = self.visible_records(viewer).await?;
        let record = records.iter().find(|r| r.bde_name == bde_name);
        if !access::can_view_bde_chart(viewer, record) {
            return Err(DashboardError::forbidden(format!(
                "Not allowed to view the chart for \"{bde_name}\"."
            )));
        }
        Ok(analytics::bde_chart(&records, bde_name))
    }

    pub async fn team_summaries(
        &self,
        viewer: Option<&Viewer>,
        scope: &RecordScope,
    ) -> DashboardResult<Vec<TeamSummary>> {
        let records = self.visible_records(viewer).await?;
        Ok(analytics::team_summaries(&records, scope))
    }

    pub async fn bde_summaries(
        &self,
        viewer: Option<&Viewer>,
        scope: &RecordScope,
    ) -> DashboardResult<Vec<BdeSummary>> {
        let records = self.visible_records(viewer).await?;
        Ok(analytics::bde_summaries(&records, scope))
    }

    pub async fn monthly_chart(
        &self,
        viewer: Option<&Viewer>,
        scope: &RecordScope,
    ) -> DashboardResult<Vec<ChartPoint>> {
        let records = self.scoped_records(viewer, scope).await?;
        Ok(analytics::monthly_chart(&records))
    }

    pub async fn top_achievers(
        &self,
        viewer: Option<&Viewer>,
        scope: &RecordScope,
        count: Option<usize>,
    ) -> DashboardResult<Vec<TopAchiever>> {
        let records = self.scoped_records(viewer, scope).await?;
        Ok(analytics::top_achievers(&records, count))
    }

    async fn scoped_records(
        &self,
        viewer: Option<&Viewer>,
        scope: &RecordScope,
    ) -> DashboardResult<Vec<RecordView>> {
        let mut records = self.visible_records(viewer).await?;
        records.retain(|r| scope.matches(r));
        Ok(records)
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX / 1000)
}

/// Join records with the directory entry of their BDE in the same branch
pub fn join_records(records: Vec<SalesRecord>, users: &[User]) -> Vec<RecordView> {
    let directory: HashMap<(&str, &str), &User> = users
        .iter()
        .map(|u| ((u.branch.as_str(), u.name.as_str()), u))
        .collect();

    records
        .into_iter()
        .map(|record| {
            let user = directory
                .get(&(record.branch.as_str(), record.bde_name.as_str()))
                .copied();
            let inactive = user.is_some_and(|u| u.inactive);
            let role = user.map(|u| u.role);
            RecordView::new(record, inactive, role)
        })
        .collect()
}

/// Log the outcome of a directory write
fn log_user_change(action: &str, user: &User) {
    info!(action, user = %user.name, branch = %user.branch, role = %user.role, "Directory updated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Month, Role};
    use crate::store::MemoryStore;
    use crate::testing::fixtures::{record, sample_csv, test_config, user, HYDERABAD, MUMBAI};
    use crate::testing::mocks::FailingStore;

    pub(super) fn dashboard_with(records: Vec<SalesRecord>, users: Vec<User>) -> Dashboard {
        let store = MemoryStore::from_parts(records, users, vec![]);
        Dashboard::new(Arc::new(store), test_config())
    }

    #[tokio::test]
    async fn test_join_uses_same_branch_directory_entry() {
        let mut inactive = user("Asha", Role::BusinessDevelopmentExecutive, MUMBAI);
        inactive.inactive = true;
        let views = join_records(
            vec![
                record("Asha", Month::May, HYDERABAD),
                record("Asha", Month::May, MUMBAI),
                record("Ghost", Month::May, MUMBAI),
            ],
            &[inactive, user("Asha", Role::TeamLeader, HYDERABAD)],
        );

        assert!(!views[0].inactive);
        assert_eq!(views[0].role, Some(Role::TeamLeader));
        assert!(views[1].inactive);
        assert_eq!(views[2].role, None);
        assert!(views.iter().all(|v| v.is_current_team_member == Some(true)));
    }

    #[tokio::test]
    async fn test_data_reports_empty_store() {
        let dashboard = dashboard_with(vec![], vec![]);
        let err = dashboard.data(None).await.unwrap_err();
        assert_eq!(err.status_code(), warp::http::StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_error_body().error,
            "Data not in database. Please upload data first."
        );
    }

    #[tokio::test]
    async fn test_viewer_resolution() {
        let dashboard = dashboard_with(vec![], vec![]);
        assert_eq!(dashboard.viewer(None).await.unwrap(), None);
        assert!(dashboard.viewer(Some("bogus")).await.is_err());

        let mut config = test_config();
        config.auth.require_session = true;
        let strict = Dashboard::new(Arc::new(MemoryStore::new()), config);
        let err = strict.viewer(None).await.unwrap_err();
        assert_eq!(err.status_code(), warp::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_respects_size_limit() {
        let mut config = test_config();
        config.upload.max_bytes = 16;
        let dashboard = Dashboard::new(Arc::new(MemoryStore::new()), config);

        let err = dashboard
            .upload(UploadRequest {
                file_name: "big.csv".into(),
                mime: None,
                bytes: sample_csv().into_bytes(),
                branch: HYDERABAD.into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upload limit"));
    }

    #[tokio::test]
    async fn test_upload_then_cleanup() {
        let dashboard = dashboard_with(vec![], vec![]);
        let report = dashboard
            .upload(UploadRequest {
                file_name: "april.csv".into(),
                mime: Some("text/csv".into()),
                bytes: sample_csv().into_bytes(),
                branch: HYDERABAD.into(),
            })
            .await
            .unwrap();
        assert_eq!(report.upsert.inserted, 2);

        let cleanup = dashboard.cleanup_duplicates().await.unwrap();
        assert_eq!(cleanup.duplicate_groups_found, 0);
        assert_eq!(dashboard.data(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bde_chart_is_gated() {
        let dashboard = dashboard_with(vec![record("Asha", Month::May, HYDERABAD)], vec![]);
        let dbm = Viewer::new("Meera", Role::DeputyBranchManager, vec![HYDERABAD.into()]);
        let tl = Viewer::new("Ravi", Role::TeamLeader, vec![HYDERABAD.into()]);

        let chart = dashboard.bde_chart(Some(&dbm), "Asha").await.unwrap();
        assert_eq!(chart.len(), 12);

        let err = dashboard.bde_chart(Some(&tl), "Asha").await.unwrap_err();
        assert_eq!(err.status_code(), warp::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_storage_errors() {
        let dashboard = Dashboard::new(Arc::new(FailingStore::new()), test_config());
        let err = dashboard.data(None).await.unwrap_err();
        assert_eq!(err.status_code(), warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_error_body().error, "A database error occurred.");
    }
}
