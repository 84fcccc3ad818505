//! Query and aggregation layer
//!
//! Pure functions over role-filtered [`RecordView`]s. Every achievement figure
//! is `round(closed_points / target * 100)`, zero when the target is not
//! positive, so the same totals always produce the same percentage.

pub mod aggregate;
pub mod kpi;

pub use aggregate::{
    bde_chart, bde_summaries, monthly_chart, team_directory, team_summaries, top_achievers,
    BdeSummary, ChartPoint, RecordScope, TeamDirectory, TeamMembers, TeamSummary, TopAchiever,
};
pub use kpi::{kpis, ChangeType, Kpi};

use crate::model::RecordView;

/// Default size of the top achievers list
pub const DEFAULT_TOP_ACHIEVERS: usize = 10;

/// Half-up rounding, matching how the dashboard has always displayed values
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Whole-number achievement percentage
pub fn achievement(closed_points: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    round_half_up(closed_points / target * 100.0)
}

/// Running sums shared by the aggregations
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Totals {
    pub target: f64,
    pub admissions: f64,
    pub closed_points: f64,
    pub cancellation: f64,
}

impl Totals {
    pub fn add(&mut self, record: &RecordView) {
        self.target += record.target;
        self.admissions += record.closed_adm;
        self.closed_points += record.closed_points;
        self.cancellation += record.cancellation;
    }

    pub fn of<'a>(records: impl IntoIterator<Item = &'a RecordView>) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.add(record);
        }
        totals
    }

    pub fn achievement(&self) -> f64 {
        achievement(self.closed_points, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_achievement_rounding() {
        assert_eq!(achievement(7.5, 10.0), 75.0);
        assert_eq!(achievement(1.0, 3.0), 33.0);
        assert_eq!(achievement(2.0, 3.0), 67.0);
        assert_eq!(achievement(1.0, 200.0), 1.0); // 0.5 rounds up
        assert_eq!(achievement(5.0, 0.0), 0.0);
        assert_eq!(achievement(5.0, -4.0), 0.0);
    }

    #[test]
    fn test_round_half_up_on_negatives() {
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(2.5), 3.0);
    }
}
