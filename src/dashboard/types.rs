//! Request and response bodies of the dashboard operations

use crate::access::Viewer;
use crate::ingest::upsert::CleanupGroup;
use crate::model::{Role, UserView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`)
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Treat blank strings the same as missing ones
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub ok: bool,
    pub branches: Vec<String>,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
    pub viewer: Viewer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub email: Option<Option<String>>,
    pub role: Option<String>,
    pub branch: Option<String>,
    pub new_branch: Option<String>,
    pub inactive: Option<bool>,
    pub is_current_team_member: Option<bool>,
    pub team_name: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub(crate) fn has_update(&self) -> bool {
        self.name.is_some()
            || self.email.is_some()
            || self.role.is_some()
            || self.new_branch.is_some()
            || self.inactive.is_some()
            || self.is_current_team_member.is_some()
            || self.password.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub branch: Option<String>,
    pub new_role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BdeTeamRequest {
    pub bde_name: Option<String>,
    pub new_team_leader: Option<String>,
    pub month: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNameRequest {
    pub team_leader: Option<String>,
    pub team_name: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub created_by_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
    pub linked_to_existing_data: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDriveRequest {
    pub name: Option<String>,
    pub start_month: Option<String>,
    pub start_year: Option<i32>,
    pub end_month: Option<String>,
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessEmailRequest {
    pub user_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLinkEntry {
    pub name: String,
    pub email: Option<String>,
    pub reset_link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessEmailResponse {
    pub success: bool,
    pub message: String,
    pub users: Vec<AccessLinkEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenUser {
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenUserResponse {
    pub success: bool,
    pub user: TokenUser,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResponse {
    pub success: bool,
    pub message: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub duplicate_groups_found: usize,
    pub total_records_deleted: usize,
    pub details: Vec<CleanupGroup>,
}

/// One entry of a bootstrap user list
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapUser {
    pub name: String,
    pub email: Option<String>,
    pub password: String,
    pub role: String,
    pub branch: String,
}

/// Bootstrap file: `[[users]]` tables
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapFile {
    #[serde(default)]
    pub users: Vec<BootstrapUser>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub created: usize,
    pub passwords_set: usize,
    pub skipped: usize,
}
