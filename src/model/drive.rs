use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named sales campaign spanning a month range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    pub name: String,
    /// Calendar month number, 1-12
    pub start_month: u8,
    pub start_year: i32,
    pub end_month: u8,
    pub end_year: i32,
    pub created_at: DateTime<Utc>,
}

impl Drive {
    pub fn same_range(&self, other: &Drive) -> bool {
        self.name == other.name
            && self.start_month == other.start_month
            && self.start_year == other.start_year
            && self.end_month == other.end_month
            && self.end_year == other.end_year
    }
}
