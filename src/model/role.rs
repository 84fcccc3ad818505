use serde::{Deserialize, Serialize};
use std::fmt;

/// Organisational role of a directory user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operations,
    #[serde(rename = "Vice President")]
    VicePresident,
    #[serde(rename = "Deputy Branch Manager")]
    DeputyBranchManager,
    #[serde(rename = "Team Leader")]
    TeamLeader,
    #[serde(rename = "Business Development Executive")]
    BusinessDevelopmentExecutive,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Operations,
        Role::VicePresident,
        Role::DeputyBranchManager,
        Role::TeamLeader,
        Role::BusinessDevelopmentExecutive,
    ];

    /// Accepts the long names (any case) and the short forms VP, DBM, TL, BDE
    pub fn parse(raw: &str) -> Option<Role> {
        let role = match raw.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "operations" => Role::Operations,
            "vice president" | "vp" => Role::VicePresident,
            "deputy branch manager" | "dbm" => Role::DeputyBranchManager,
            "team leader" | "tl" => Role::TeamLeader,
            "business development executive" | "bde" => Role::BusinessDevelopmentExecutive,
            _ => return None,
        };
        Some(role)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Operations => "Operations",
            Role::VicePresident => "Vice President",
            Role::DeputyBranchManager => "Deputy Branch Manager",
            Role::TeamLeader => "Team Leader",
            Role::BusinessDevelopmentExecutive => "Business Development Executive",
        }
    }

    /// Full-access roles see every branch and every record
    pub fn is_full_access(self) -> bool {
        matches!(self, Role::Admin | Role::Operations | Role::VicePresident)
    }

    /// Roles a user edit may assign; Admin and Operations are only granted at
    /// creation or bootstrap
    pub fn is_assignable(self) -> bool {
        matches!(
            self,
            Role::VicePresident
                | Role::DeputyBranchManager
                | Role::TeamLeader
                | Role::BusinessDevelopmentExecutive
        )
    }

    /// Rank among the sales roles derived from uploads (DBM > TL > BDE).
    /// `None` for roles that are only ever assigned by hand.
    pub fn hierarchy_rank(self) -> Option<u8> {
        match self {
            Role::DeputyBranchManager => Some(3),
            Role::TeamLeader => Some(2),
            Role::BusinessDevelopmentExecutive => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
