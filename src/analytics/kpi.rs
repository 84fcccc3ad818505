//! Headline KPI cards

use super::{round_half_up, Totals};
use crate::model::{Month, RecordView};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Positive,
    Negative,
    Neutral,
}

impl ChangeType {
    fn of(change: f64) -> Self {
        if change > 0.0 {
            ChangeType::Positive
        } else if change < 0.0 {
            ChangeType::Negative
        } else {
            ChangeType::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub label: &'static str,
    pub value: f64,
    pub change: f64,
    pub change_type: ChangeType,
    pub icon: &'static str,
}

impl Kpi {
    fn trending(label: &'static str, icon: &'static str, value: f64, latest: f64, previous: f64) -> Self {
        let change = if previous > 0.0 {
            (latest - previous) / previous * 100.0
        } else {
            0.0
        };
        Self {
            label,
            value,
            change: round_half_up(change * 100.0) / 100.0,
            change_type: ChangeType::of(change),
            icon,
        }
    }

    fn flat(label: &'static str, icon: &'static str, value: f64) -> Self {
        Self {
            label,
            value,
            change: 0.0,
            change_type: ChangeType::Neutral,
            icon,
        }
    }
}

/// KPI cards for `branch` (all branches when `None`).
///
/// Values total the selected `month` or every month. Changes always compare
/// the selected (or latest present) month against the fiscal month before it.
pub fn kpis(records: &[RecordView], month: Option<Month>, branch: Option<&str>) -> Vec<Kpi> {
    let in_branch: Vec<&RecordView> = records
        .iter()
        .filter(|r| branch.map_or(true, |b| r.branch == b))
        .collect();

    let values: Vec<&RecordView> = in_branch
        .iter()
        .copied()
        .filter(|r| month.map_or(true, |m| r.month == m))
        .collect();

    let latest_month = month.or_else(|| in_branch.iter().map(|r| r.month).max());
    let previous_month = latest_month.and_then(Month::previous);

    let totals_for = |m: Option<Month>| match m {
        Some(m) => Totals::of(in_branch.iter().copied().filter(|r| r.month == m)),
        None => Totals::default(),
    };
    let latest = totals_for(latest_month);
    let previous = totals_for(previous_month);
    let totals = Totals::of(values.iter().copied());

    let active_bdes: HashSet<&str> = values
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.bde_name.as_str())
        .collect();

    vec![
        Kpi::trending("Total Target", "target", totals.target, latest.target, previous.target),
        Kpi::trending(
            "Total Admissions",
            "users",
            totals.admissions,
            latest.admissions,
            previous.admissions,
        ),
        Kpi::trending(
            "Closed Points",
            "trending-up",
            totals.closed_points,
            latest.closed_points,
            previous.closed_points,
        ),
        Kpi::trending(
            "Cancellation",
            "x-circle",
            totals.cancellation,
            latest.cancellation,
            previous.cancellation,
        ),
        Kpi::flat("Achievement %", "percent", totals.achievement()),
        Kpi::flat("Active BDEs", "user-check", active_bdes.len() as f64),
    ]
}
