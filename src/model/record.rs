use super::{Month, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One BDE's performance for one month of one fiscal year in one branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    pub id: String,
    pub fy: String,
    pub month: Month,
    pub branch: String,
    pub drive: String,
    pub dbm: String,
    pub team_leader: String,
    pub team_name: String,
    pub bde_name: String,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub admissions: f64,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub closed_adm: f64,
    #[serde(default)]
    pub cancellation: f64,
    #[serde(default)]
    pub incomplete: f64,
    #[serde(default)]
    pub closed_points: f64,
    #[serde(default)]
    pub target_pct: f64,
    #[serde(default)]
    pub achievement_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current_team_member: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl SalesRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            bde_name: self.bde_name.clone(),
            month: self.month,
            fy: self.fy.clone(),
            branch: self.branch.clone(),
        }
    }

    /// Copy every uploaded field from `incoming`, keeping identity and the
    /// manually maintained team-membership flag
    pub fn overwrite_from(&mut self, incoming: &SalesRecord) {
        let id = std::mem::take(&mut self.id);
        let membership = self.is_current_team_member;
        *self = incoming.clone();
        self.id = id;
        self.is_current_team_member = membership;
    }
}

/// Upsert identity of a sales record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub bde_name: String,
    pub month: Month,
    pub fy: String,
    pub branch: String,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | FY{} | {}",
            self.bde_name, self.month, self.fy, self.branch
        )
    }
}

/// A record joined with its BDE's directory entry, as served by `/api/data`.
/// The membership flag is always present on a view (absent means current).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    #[serde(flatten)]
    pub record: SalesRecord,
    pub inactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl RecordView {
    pub fn new(mut record: SalesRecord, inactive: bool, role: Option<Role>) -> Self {
        record.is_current_team_member = Some(record.is_current_team_member.unwrap_or(true));
        Self {
            record,
            inactive,
            role,
        }
    }

    pub fn is_current_member(&self) -> bool {
        self.record.is_current_team_member.unwrap_or(true)
    }

    pub fn is_active(&self) -> bool {
        !self.inactive
    }
}

impl std::ops::Deref for RecordView {
    type Target = SalesRecord;

    fn deref(&self) -> &SalesRecord {
        &self.record
    }
}
