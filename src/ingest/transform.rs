//! Turning raw rows into normalized sales records

use super::headers::{CanonicalField, HeaderValidation};
use super::table::RawTable;
use crate::model::{Month, Role, SalesRecord, User};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

pub const UNASSIGNED: &str = "Unassigned";

/// A data row that could not be turned into a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// 1-based position among the data rows
    pub row_number: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSummary {
    pub total_rows: usize,
    pub success_count: usize,
    pub rejected_count: usize,
    /// Percentage with two decimals, e.g. `"66.67%"`
    pub success_rate: String,
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub records: Vec<SalesRecord>,
    pub rejected: Vec<RejectedRow>,
    pub summary: TransformSummary,
}

/// Fills in the DBM for rows that leave it blank, from the branch directory
#[derive(Debug, Clone, Default)]
pub struct DbmResolver {
    directory: Vec<(String, Role)>,
}

impl DbmResolver {
    pub fn from_users(users: &[User], branch: &str) -> Self {
        Self {
            directory: users
                .iter()
                .filter(|u| u.branch == branch)
                .map(|u| (u.name.clone(), u.role))
                .collect(),
        }
    }

    /// The BDE themself when they are a DBM, else any DBM of the branch,
    /// else `Unassigned`
    pub fn resolve(&self, bde_name: &str) -> String {
        let wanted = bde_name.to_lowercase();
        if let Some((name, _)) = self
            .directory
            .iter()
            .find(|(name, role)| *role == Role::DeputyBranchManager && name.to_lowercase() == wanted)
        {
            return name.clone();
        }

        self.directory
            .iter()
            .find(|(_, role)| *role == Role::DeputyBranchManager)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| UNASSIGNED.to_string())
    }
}

/// Per-upload values applied to every row
#[derive(Debug, Clone)]
pub struct TransformContext<'a> {
    pub branch: &'a str,
    pub drive: &'a str,
    pub default_fy: &'a str,
    pub uploaded_at: DateTime<Utc>,
    pub dbm_resolver: &'a DbmResolver,
}

/// Lenient number parsing: thousands separators and a trailing `%` are
/// dropped, then the longest leading decimal literal is read. Anything
/// unparseable is 0.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim_end_matches('%').trim();
    let bytes = cleaned.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    cleaned[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `closed_points / target * 100` to two decimals, 0 without a target
pub fn achievement_pct(closed_points: f64, target: f64) -> f64 {
    if target > 0.0 {
        round2(closed_points / target * 100.0)
    } else {
        0.0
    }
}

/// Transform every data row of `table` using a validated header mapping
pub fn transform_rows(
    table: &RawTable,
    headers: &HeaderValidation,
    ctx: &TransformContext<'_>,
) -> TransformOutcome {
    let mut records = Vec::with_capacity(table.rows.len());
    let mut rejected = Vec::new();

    for (index, row) in table.rows.iter().enumerate() {
        let row_number = index + 1;
        let text = |field: CanonicalField| RawTable::cell(row, headers.column(field)).trim();
        let number = |field: CanonicalField| parse_number(RawTable::cell(row, headers.column(field)));

        let bde_name = text(CanonicalField::Bde);
        if bde_name.is_empty() {
            warn!(row = row_number, "Row rejected: missing BDE name");
            rejected.push(RejectedRow {
                row_number,
                reason: "Missing required BDE name".to_string(),
            });
            continue;
        }

        let month_raw = text(CanonicalField::Month);
        let Some(month) = Month::parse(month_raw) else {
            warn!(row = row_number, month = month_raw, "Row rejected: invalid month");
            rejected.push(RejectedRow {
                row_number,
                reason: format!("Invalid month: \"{month_raw}\""),
            });
            continue;
        };

        let fy = match text(CanonicalField::Fy) {
            "" => ctx.default_fy.to_string(),
            fy => fy.to_string(),
        };
        let dbm = match text(CanonicalField::Dbm) {
            "" => ctx.dbm_resolver.resolve(bde_name),
            dbm => dbm.to_string(),
        };
        let team_leader = match text(CanonicalField::TeamLeader) {
            "" => UNASSIGNED.to_string(),
            tl => tl.to_string(),
        };

        let target = number(CanonicalField::Target);
        let closed_points = number(CanonicalField::ClosedPoint);

        let record = SalesRecord {
            id: uuid::Uuid::new_v4().to_string(),
            fy,
            month,
            branch: ctx.branch.to_string(),
            drive: ctx.drive.to_string(),
            dbm,
            team_name: team_leader.clone(),
            team_leader,
            bde_name: bde_name.to_string(),
            target,
            admissions: number(CanonicalField::Admissions),
            points: number(CanonicalField::Points),
            closed_adm: number(CanonicalField::ClosedAdmissions),
            cancellation: number(CanonicalField::Cancellation),
            incomplete: number(CanonicalField::IncompleteForm),
            closed_points,
            target_pct: number(CanonicalField::TargetPct),
            achievement_pct: achievement_pct(closed_points, target),
            is_current_team_member: None,
            uploaded_at: Some(ctx.uploaded_at),
        };

        debug!(
            row = row_number,
            bde = %record.bde_name,
            month = %record.month,
            target = record.target,
            closed_points = record.closed_points,
            achievement = record.achievement_pct,
            "Row processed"
        );
        records.push(record);
    }

    let total_rows = table.rows.len();
    let success_rate = if total_rows == 0 {
        0.0
    } else {
        records.len() as f64 / total_rows as f64 * 100.0
    };
    let summary = TransformSummary {
        total_rows,
        success_count: records.len(),
        rejected_count: rejected.len(),
        success_rate: format!("{success_rate:.2}%"),
    };

    TransformOutcome {
        records,
        rejected,
        summary,
    }
}
