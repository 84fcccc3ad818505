//! Role-based visibility of records and dashboard actions
//!
//! Admin, Operations and Vice President see everything. A DBM sees their
//! branches, a team leader sees their current active team plus their own
//! records, and a BDE sees only their own records.

use crate::model::{RecordView, Role};
use serde::Serialize;

/// The person looking at the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub name: String,
    pub role: Role,
    pub branches: Vec<String>,
}

impl Viewer {
    pub fn new(name: impl Into<String>, role: Role, branches: Vec<String>) -> Self {
        Self {
            name: name.into(),
            role,
            branches,
        }
    }

    fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    fn is_sales_floor(&self) -> bool {
        matches!(
            self.role,
            Role::TeamLeader | Role::BusinessDevelopmentExecutive
        )
    }
}

/// Branches a user may see: every configured branch for full-access roles,
/// otherwise the user's own
pub fn branches_for(role: Role, home_branch: &str, all_branches: &[String]) -> Vec<String> {
    if role.is_full_access() {
        all_branches.to_vec()
    } else {
        vec![home_branch.to_string()]
    }
}

/// Records `viewer` may see. Without a viewer nothing is filtered.
pub fn filter_records(records: Vec<RecordView>, viewer: Option<&Viewer>) -> Vec<RecordView> {
    let Some(viewer) = viewer else {
        return records;
    };

    match viewer.role {
        Role::Admin | Role::Operations | Role::VicePresident => records,
        Role::DeputyBranchManager => records
            .into_iter()
            .filter(|r| viewer.has_branch(&r.branch))
            .collect(),
        Role::TeamLeader => records
            .into_iter()
            .filter(|r| {
                (r.team_leader == viewer.name && r.is_active() && r.is_current_member())
                    || r.bde_name == viewer.name
            })
            .collect(),
        Role::BusinessDevelopmentExecutive => records
            .into_iter()
            .filter(|r| r.bde_name == viewer.name)
            .collect(),
    }
}

/// Whether the per-BDE monthly chart may be opened for `record`'s BDE
pub fn can_view_bde_chart(viewer: Option<&Viewer>, record: Option<&RecordView>) -> bool {
    let Some(viewer) = viewer else {
        return false;
    };
    match viewer.role {
        role if role.is_full_access() => true,
        Role::DeputyBranchManager => record.is_some_and(|r| viewer.has_branch(&r.branch)),
        _ => false,
    }
}

pub fn can_see_more(viewer: Option<&Viewer>) -> bool {
    viewer.is_some_and(|v| !v.is_sales_floor())
}

pub fn can_click_bde_name(viewer: Option<&Viewer>, record: Option<&RecordView>) -> bool {
    let Some(viewer) = viewer else {
        return false;
    };
    match viewer.role {
        Role::TeamLeader | Role::BusinessDevelopmentExecutive => false,
        Role::DeputyBranchManager => record.is_some_and(|r| viewer.has_branch(&r.branch)),
        _ => true,
    }
}

pub fn is_table_read_only(viewer: Option<&Viewer>) -> bool {
    viewer.map_or(true, Viewer::is_sales_floor)
}

pub fn shows_top_achiever_values(viewer: Option<&Viewer>) -> bool {
    viewer.is_some_and(|v| v.role.is_full_access())
}

/// Flags the front end uses to enable or hide actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub viewer: Option<Viewer>,
    pub full_access: bool,
    pub can_see_more: bool,
    pub table_read_only: bool,
    pub show_top_achiever_values: bool,
}

pub fn visibility(viewer: Option<&Viewer>) -> Visibility {
    Visibility {
        viewer: viewer.cloned(),
        full_access: viewer.is_some_and(|v| v.role.is_full_access()),
        can_see_more: can_see_more(viewer),
        table_read_only: is_table_read_only(viewer),
        show_top_achiever_values: shows_top_achiever_values(viewer),
    }
}
