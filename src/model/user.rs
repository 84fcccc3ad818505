use super::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory entry, including credential material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    pub branch: String,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default = "default_true")]
    pub is_current_team_member: bool,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub reset_token_hash: Option<String>,
    #[serde(default)]
    pub reset_token_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_performance_data: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    /// A directory entry derived from uploaded records: active, no credentials
    pub fn derived(name: &str, role: Role, branch: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: None,
            role,
            branch: branch.to_string(),
            inactive: false,
            is_current_team_member: true,
            password_hash: None,
            reset_token_hash: None,
            reset_token_expires: None,
            has_performance_data: true,
        }
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub fn email_matches(&self, login: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(login.trim()))
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// Secret-free projection of a [`User`] returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub branch: String,
    pub inactive: bool,
    pub is_current_team_member: bool,
    pub has_password: bool,
    pub has_performance_data: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            branch: user.branch.clone(),
            inactive: user.inactive,
            is_current_team_member: user.is_current_team_member,
            has_password: user.password_hash.is_some(),
            has_performance_data: user.has_performance_data,
        }
    }
}
