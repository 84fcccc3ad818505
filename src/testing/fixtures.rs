//! Canned records, users and upload bodies

use crate::config::DashboardConfig;
use crate::ingest::UploadSettings;
use crate::model::{Month, RecordView, Role, SalesRecord, User};
use chrono::Utc;

pub const HYDERABAD: &str = "Hyderabad Branch";
pub const MUMBAI: &str = "Mumbai Branch";

/// A record for `name` under DBM "Meera" and team leader "Ravi" in FY 2025
pub fn record(name: &str, month: Month, branch: &str) -> SalesRecord {
    SalesRecord {
        id: uuid::Uuid::new_v4().to_string(),
        fy: "2025".to_string(),
        month,
        branch: branch.to_string(),
        drive: "2025 Performance".to_string(),
        dbm: "Meera".to_string(),
        team_leader: "Ravi".to_string(),
        team_name: "Ravi".to_string(),
        bde_name: name.to_string(),
        target: 10.0,
        admissions: 8.0,
        points: 9.0,
        closed_adm: 6.0,
        cancellation: 1.0,
        incomplete: 1.0,
        closed_points: 7.5,
        target_pct: 75.0,
        achievement_pct: 75.0,
        is_current_team_member: None,
        uploaded_at: Some(Utc::now()),
    }
}

/// A record with explicit target and closed points, achievement derived
pub fn scored_record(
    name: &str,
    month: Month,
    branch: &str,
    target: f64,
    closed_points: f64,
) -> SalesRecord {
    let mut rec = record(name, month, branch);
    rec.target = target;
    rec.closed_points = closed_points;
    rec.achievement_pct = crate::ingest::transform::achievement_pct(closed_points, target);
    rec
}

/// Joined view of an active BDE
pub fn view(record: SalesRecord) -> RecordView {
    RecordView::new(record, false, Some(Role::BusinessDevelopmentExecutive))
}

/// Joined view of an inactive BDE
pub fn inactive_view(record: SalesRecord) -> RecordView {
    RecordView::new(record, true, Some(Role::BusinessDevelopmentExecutive))
}

/// A directory user with a login email
pub fn user(name: &str, role: Role, branch: &str) -> User {
    let mut user = User::derived(name, role, branch);
    user.email = Some(format!(
        "{}@example.com",
        name.to_lowercase().replace(' ', ".")
    ));
    user
}

/// Three data rows: two valid, one with an unknown month
pub fn sample_csv() -> String {
    [
        "FY,Month,DBM,Team Leader,BDE,Target,Admissions,Points,Closed Admissions,\
         Cancellation/backout,Incomplete Form,Closed Point,Target %",
        "2025,April,Meera,Ravi,Asha,10,8,9,6,1,1,7.5,75",
        "2025,May,Meera,Ravi,Vikram,\"1,000\",12,14,10,0,2,250,25%",
        "2025,Smarch,Meera,Ravi,Kiran,5,5,5,5,0,0,5,100",
    ]
    .join("\n")
}

pub fn upload_settings() -> UploadSettings {
    UploadSettings {
        drive_name: "2025 Performance".to_string(),
        default_fiscal_year: "2025".to_string(),
    }
}

/// Default configuration with a cheap PBKDF2 cost
pub fn test_config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.auth.pbkdf2_iterations = 1000;
    config.server.frontend_url = Some("https://dash.example.com".to_string());
    config
}
