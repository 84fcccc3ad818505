//! Per-team, per-BDE and per-month aggregations

use super::{achievement, Totals, DEFAULT_TOP_ACHIEVERS};
use crate::model::{Month, RecordView, Role, User};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Optional narrowing applied before aggregating
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScope {
    pub branch: Option<String>,
    pub drive: Option<String>,
    pub month: Option<Month>,
    pub team_leader: Option<String>,
}

impl RecordScope {
    pub fn branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &RecordView) -> bool {
        self.branch.as_ref().map_or(true, |b| &record.branch == b)
            && self.drive.as_ref().map_or(true, |d| &record.drive == d)
            && self.month.map_or(true, |m| record.month == m)
            && self
                .team_leader
                .as_ref()
                .map_or(true, |tl| &record.team_leader == tl)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub dbm: String,
    pub team_leader: String,
    pub team_name: String,
    pub total_target: f64,
    pub total_admissions: f64,
    pub total_closed_points: f64,
    pub avg_achievement: f64,
    pub bde_count: usize,
    pub records: Vec<RecordView>,
}

/// Teams keyed by `(dbm, team_leader)` in first-seen order.
/// The team leader filter of `scope` is ignored.
pub fn team_summaries(records: &[RecordView], scope: &RecordScope) -> Vec<TeamSummary> {
    let scope = RecordScope {
        team_leader: None,
        ..scope.clone()
    };
    let mut teams: Vec<(Totals, TeamSummary)> = Vec::new();
    let mut position: HashMap<(&str, &str), usize> = HashMap::new();

    for record in records.iter().filter(|r| scope.matches(r)) {
        let key = (record.dbm.as_str(), record.team_leader.as_str());
        let i = *position.entry(key).or_insert_with(|| {
            teams.push((
                Totals::default(),
                TeamSummary {
                    dbm: record.dbm.clone(),
                    team_leader: record.team_leader.clone(),
                    team_name: record.team_name.clone(),
                    total_target: 0.0,
                    total_admissions: 0.0,
                    total_closed_points: 0.0,
                    avg_achievement: 0.0,
                    bde_count: 0,
                    records: Vec::new(),
                },
            ));
            teams.len() - 1
        });
        teams[i].0.add(record);
        teams[i].1.records.push(record.clone());
    }

    teams
        .into_iter()
        .map(|(totals, mut team)| {
            team.total_target = totals.target;
            team.total_admissions = totals.admissions;
            team.total_closed_points = totals.closed_points;
            team.avg_achievement = totals.achievement();
            team.bde_count = team
                .records
                .iter()
                .map(|r| r.bde_name.as_str())
                .collect::<HashSet<_>>()
                .len();
            team
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub label: &'static str,
    pub target: f64,
    pub admissions: f64,
    pub closed_points: f64,
    pub achievement: f64,
}

impl ChartPoint {
    fn new(month: Month, totals: Totals) -> Self {
        Self {
            label: month.short_label(),
            target: totals.target,
            admissions: totals.admissions,
            closed_points: totals.closed_points,
            achievement: totals.achievement(),
        }
    }
}

fn totals_by_month<'a>(records: impl Iterator<Item = &'a RecordView>) -> BTreeMap<Month, Totals> {
    let mut months: BTreeMap<Month, Totals> = BTreeMap::new();
    for record in records {
        months.entry(record.month).or_default().add(record);
    }
    months
}

/// One point per fiscal month that has records, in fiscal order
pub fn monthly_chart(records: &[RecordView]) -> Vec<ChartPoint> {
    totals_by_month(records.iter())
        .into_iter()
        .map(|(month, totals)| ChartPoint::new(month, totals))
        .collect()
}

/// All twelve fiscal months for one active BDE, zero-filled
pub fn bde_chart(records: &[RecordView], bde_name: &str) -> Vec<ChartPoint> {
    let months = totals_by_month(
        records
            .iter()
            .filter(|r| r.bde_name == bde_name && r.is_active()),
    );
    Month::FISCAL_ORDER
        .iter()
        .map(|&month| ChartPoint::new(month, months.get(&month).copied().unwrap_or_default()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BdeSummary {
    pub name: String,
    pub team_name: String,
    pub total_target: f64,
    pub total_admissions: f64,
    pub total_closed_points: f64,
    pub avg_achievement: f64,
}

/// Active BDEs within `scope`, in first-seen order. The team name is the team
/// leader of the BDE's first record.
pub fn bde_summaries(records: &[RecordView], scope: &RecordScope) -> Vec<BdeSummary> {
    let mut bdes: Vec<(Totals, BdeSummary)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for record in records
        .iter()
        .filter(|r| scope.matches(r) && r.is_active())
    {
        let i = *position.entry(record.bde_name.as_str()).or_insert_with(|| {
            bdes.push((
                Totals::default(),
                BdeSummary {
                    name: record.bde_name.clone(),
                    team_name: record.team_leader.clone(),
                    total_target: 0.0,
                    total_admissions: 0.0,
                    total_closed_points: 0.0,
                    avg_achievement: 0.0,
                },
            ));
            bdes.len() - 1
        });
        bdes[i].0.add(record);
    }

    bdes.into_iter()
        .map(|(totals, mut bde)| {
            bde.total_target = totals.target;
            bde.total_admissions = totals.admissions;
            bde.total_closed_points = totals.closed_points;
            bde.avg_achievement = totals.achievement();
            bde
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAchiever {
    pub name: String,
    pub branch: String,
    pub team_leader: String,
    pub total_target: f64,
    pub total_admissions: f64,
    pub total_closed_points: f64,
    pub achievement: f64,
}

/// Active BDEs ranked by achievement, highest first. Ties keep first-seen order.
pub fn top_achievers(records: &[RecordView], count: Option<usize>) -> Vec<TopAchiever> {
    let mut achievers: Vec<TopAchiever> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for record in records.iter().filter(|r| r.is_active()) {
        let i = *position.entry(record.bde_name.as_str()).or_insert_with(|| {
            achievers.push(TopAchiever {
                name: record.bde_name.clone(),
                branch: record.branch.clone(),
                team_leader: record.team_leader.clone(),
                total_target: 0.0,
                total_admissions: 0.0,
                total_closed_points: 0.0,
                achievement: 0.0,
            });
            achievers.len() - 1
        });
        let entry = &mut achievers[i];
        entry.total_target += record.target;
        entry.total_admissions += record.closed_adm;
        entry.total_closed_points += record.closed_points;
    }

    for entry in achievers.iter_mut() {
        entry.achievement = achievement(entry.total_closed_points, entry.total_target);
    }
    // sort_by is stable
    achievers.sort_by(|a, b| b.achievement.total_cmp(&a.achievement));
    achievers.truncate(count.unwrap_or(DEFAULT_TOP_ACHIEVERS));
    achievers
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMembers {
    #[serde(rename = "DBM")]
    pub dbm: String,
    pub leader: String,
    pub members: Vec<String>,
}

/// Branch → team name → team, plus the designation of every person named
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamDirectory {
    pub teams: BTreeMap<String, BTreeMap<String, TeamMembers>>,
    pub designations: BTreeMap<String, Role>,
}

/// Team structure derived from records. Members are the active current
/// members of a team, or every active member when none is flagged current.
pub fn team_directory(records: &[RecordView], users: &[User]) -> TeamDirectory {
    #[derive(Default)]
    struct Roster<'a> {
        dbm: &'a str,
        leader: &'a str,
        current: Vec<&'a str>,
        all: Vec<&'a str>,
    }

    let mut rosters: BTreeMap<(&str, &str), Roster<'_>> = BTreeMap::new();
    let mut designations: BTreeMap<String, Role> = BTreeMap::new();

    for record in records {
        if record.team_name.trim().is_empty() {
            continue;
        }
        let roster = rosters
            .entry((record.branch.as_str(), record.team_name.as_str()))
            .or_insert_with(|| Roster {
                dbm: &record.dbm,
                leader: &record.team_leader,
                ..Roster::default()
            });
        if record.is_active() {
            roster.all.push(&record.bde_name);
            if record.is_current_member() {
                roster.current.push(&record.bde_name);
            }
        }

        let people = [
            (&record.dbm, Role::DeputyBranchManager),
            (&record.team_leader, Role::TeamLeader),
            (&record.bde_name, Role::BusinessDevelopmentExecutive),
        ];
        for (name, role) in people {
            if name.trim().is_empty() {
                continue;
            }
            let entry = designations.entry(name.clone()).or_insert(role);
            if role.hierarchy_rank() > entry.hierarchy_rank() {
                *entry = role;
            }
        }
    }

    // The directory is authoritative where it knows the person
    for user in users {
        if designations.contains_key(&user.name) {
            designations.insert(user.name.clone(), user.role);
        }
    }

    let mut teams: BTreeMap<String, BTreeMap<String, TeamMembers>> = BTreeMap::new();
    for ((branch, team_name), roster) in rosters {
        let chosen = if roster.current.is_empty() {
            roster.all
        } else {
            roster.current
        };
        let mut members: Vec<String> = chosen
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        members.sort();

        teams.entry(branch.to_string()).or_default().insert(
            team_name.to_string(),
            TeamMembers {
                dbm: roster.dbm.to_string(),
                leader: roster.leader.to_string(),
                members,
            },
        );
    }

    TeamDirectory {
        teams,
        designations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{inactive_view, scored_record, user, view, HYDERABAD, MUMBAI};

    fn team_record(name: &str, month: Month, leader: &str, target: f64, closed: f64) -> RecordView {
        let mut rec = scored_record(name, month, HYDERABAD, target, closed);
        rec.team_leader = leader.to_string();
        rec.team_name = leader.to_string();
        view(rec)
    }

    #[test]
    fn test_team_summaries_group_by_dbm_and_leader() {
        let records = vec![
            team_record("Asha", Month::April, "Ravi", 100.0, 50.0),
            team_record("Asha", Month::May, "Ravi", 100.0, 100.0),
            team_record("Vikram", Month::May, "Ravi", 50.0, 25.0),
            team_record("Neha", Month::May, "Priya", 10.0, 10.0),
        ];

        let teams = team_summaries(&records, &RecordScope::default());
        assert_eq!(teams.len(), 2);

        let ravi = &teams[0];
        assert_eq!(ravi.team_leader, "Ravi");
        assert_eq!(ravi.total_target, 250.0);
        assert_eq!(ravi.total_closed_points, 175.0);
        assert_eq!(ravi.avg_achievement, 70.0);
        assert_eq!(ravi.bde_count, 2);
        assert_eq!(ravi.records.len(), 3);

        let may = RecordScope {
            month: Some(Month::May),
            ..RecordScope::default()
        };
        let teams = team_summaries(&records, &may);
        assert_eq!(teams[0].records.len(), 2);
    }

    #[test]
    fn test_monthly_chart_skips_empty_months() {
        let records = vec![
            team_record("Asha", Month::January, "Ravi", 10.0, 5.0),
            team_record("Asha", Month::April, "Ravi", 10.0, 10.0),
            team_record("Vikram", Month::April, "Ravi", 10.0, 0.0),
        ];

        let chart = monthly_chart(&records);
        let labels: Vec<_> = chart.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["APR", "JAN"]);
        assert_eq!(chart[0].target, 20.0);
        assert_eq!(chart[0].achievement, 50.0);
    }

    #[test]
    fn test_bde_chart_has_all_months() {
        let records = vec![
            team_record("Asha", Month::June, "Ravi", 10.0, 8.0),
            team_record("Vikram", Month::June, "Ravi", 10.0, 1.0),
        ];

        let chart = bde_chart(&records, "Asha");
        assert_eq!(chart.len(), 12);
        assert_eq!(chart[0].label, "APR");
        assert_eq!(chart[2].achievement, 80.0);
        assert_eq!(chart[11].target, 0.0);
    }

    #[test]
    fn test_inactive_bdes_excluded_from_rankings() {
        let records = vec![
            view(scored_record("Asha", Month::May, HYDERABAD, 10.0, 5.0)),
            inactive_view(scored_record("Kiran", Month::May, HYDERABAD, 10.0, 10.0)),
        ];

        assert!(bde_chart(&records, "Kiran").iter().all(|p| p.target == 0.0));
        let bdes = bde_summaries(&records, &RecordScope::default());
        assert_eq!(bdes.len(), 1);
        assert_eq!(bdes[0].team_name, "Ravi");
        let top = top_achievers(&records, None);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "Asha");
    }

    #[test]
    fn test_bde_summaries_scope() {
        let records = vec![
            team_record("Asha", Month::May, "Ravi", 10.0, 5.0),
            team_record("Vikram", Month::May, "Priya", 10.0, 5.0),
            view(scored_record("Neha", Month::May, MUMBAI, 10.0, 5.0)),
        ];
        let scope = RecordScope {
            branch: Some(HYDERABAD.to_string()),
            team_leader: Some("Priya".to_string()),
            ..RecordScope::default()
        };

        let bdes = bde_summaries(&records, &scope);
        assert_eq!(bdes.len(), 1);
        assert_eq!(bdes[0].name, "Vikram");
    }

    #[test]
    fn test_top_achievers_sorted_stable_and_truncated() {
        let records = vec![
            view(scored_record("Asha", Month::May, HYDERABAD, 10.0, 5.0)),
            view(scored_record("Vikram", Month::May, HYDERABAD, 10.0, 9.0)),
            view(scored_record("Neha", Month::May, MUMBAI, 10.0, 5.0)),
            view(scored_record("Asha", Month::June, HYDERABAD, 10.0, 5.0)),
        ];

        let top = top_achievers(&records, Some(2));
        let names: Vec<_> = top.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Vikram", "Asha"]);
        assert_eq!(top[1].total_target, 20.0);
        assert_eq!(top[1].total_admissions, 12.0);
    }

    #[test]
    fn test_team_directory_members_and_designations() {
        let mut moved = scored_record("Vikram", Month::May, HYDERABAD, 1.0, 1.0);
        moved.is_current_team_member = Some(false);
        let records = vec![
            team_record("Asha", Month::May, "Ravi", 1.0, 1.0),
            team_record("Asha", Month::June, "Ravi", 1.0, 1.0),
            view(moved),
            inactive_view(scored_record("Kiran", Month::May, HYDERABAD, 1.0, 1.0)),
        ];
        let users = vec![user("Asha", Role::TeamLeader, HYDERABAD)];

        let directory = team_directory(&records, &users);
        let team = &directory.teams[HYDERABAD]["Ravi"];
        assert_eq!(team.dbm, "Meera");
        assert_eq!(team.leader, "Ravi");
        assert_eq!(team.members, vec!["Asha".to_string()]);

        assert_eq!(directory.designations["Meera"], Role::DeputyBranchManager);
        assert_eq!(directory.designations["Ravi"], Role::TeamLeader);
        assert_eq!(directory.designations["Asha"], Role::TeamLeader);
        assert_eq!(directory.designations["Kiran"], Role::BusinessDevelopmentExecutive);
    }
}
