//! Route handlers: resolve the caller, run the operation, render the result

use super::reply::{handle, login_reply};
use super::upload::read_upload_form;
use crate::access;
use crate::analytics::RecordScope;
use crate::dashboard::*;
use crate::error::DashboardResult;
use crate::model::Month;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::multipart::FormData;
use warp::reply::Response;

/// Query of the top-achievers route: the usual scope plus a count
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAchieversQuery {
    pub branch: Option<String>,
    pub drive: Option<String>,
    pub month: Option<Month>,
    pub team_leader: Option<String>,
    pub count: Option<usize>,
}

impl TopAchieversQuery {
    fn scope(&self) -> RecordScope {
        RecordScope {
            branch: self.branch.clone(),
            drive: self.drive.clone(),
            month: self.month,
            team_leader: self.team_leader.clone(),
        }
    }
}

pub async fn login(dashboard: Arc<Dashboard>, request: LoginRequest) -> Result<Response, Infallible> {
    Ok(login_reply(dashboard.login(request).await))
}

pub async fn logout(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    handle("logout", async move {
        let ended = match token {
            Some(token) => dashboard.logout(&token).await,
            None => false,
        };
        Ok(MessageResponse::ok(if ended {
            "Logged out"
        } else {
            "No active session"
        }))
    })
    .await
}

pub async fn data(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    handle("data", async move {
        let viewer = dashboard.viewer(token.as_deref()).await?;
        dashboard.data(viewer.as_ref()).await
    })
    .await
}

pub async fn access(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    handle("access", async move {
        let viewer = dashboard.viewer(token.as_deref()).await?;
        Ok(access::visibility(viewer.as_ref()))
    })
    .await
}

pub async fn upload(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    form: FormData,
) -> Result<Response, Infallible> {
    admin("upload-excel", dashboard, token, |dashboard| async move {
        let request = read_upload_form(form).await?;
        dashboard.upload(request).await
    })
    .await
}

pub async fn cleanup_duplicates(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
) -> Result<Response, Infallible> {
    admin("cleanup-duplicates", dashboard, token, |dashboard| async move {
        dashboard.cleanup_duplicates().await
    })
    .await
}

pub async fn users(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    admin("users", dashboard, token, |dashboard| async move { dashboard.users().await }).await
}

pub async fn create_user(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: CreateUserRequest,
) -> Result<Response, Infallible> {
    admin("create-user", dashboard, token, |dashboard| async move {
        dashboard.create_user(request).await
    })
    .await
}

pub async fn update_user(
    name: String,
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: UpdateUserRequest,
) -> Result<Response, Infallible> {
    admin("update-user", dashboard, token, |dashboard| async move {
        dashboard.update_user(&name, request).await
    })
    .await
}

pub async fn update_role(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: UpdateRoleRequest,
) -> Result<Response, Infallible> {
    admin("update-role", dashboard, token, |dashboard| async move {
        dashboard.update_role(request).await
    })
    .await
}

pub async fn update_bde_team(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: BdeTeamRequest,
) -> Result<Response, Infallible> {
    admin("bde-team", dashboard, token, |dashboard| async move {
        dashboard.update_bde_team(request).await
    })
    .await
}

pub async fn update_team_name(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: TeamNameRequest,
) -> Result<Response, Infallible> {
    admin("team-name", dashboard, token, |dashboard| async move {
        dashboard.update_team_name(request).await
    })
    .await
}

pub async fn bde_names(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    scoped("bde-names", dashboard, token, |dashboard, _| async move {
        dashboard.bde_names().await
    })
    .await
}

pub async fn roles(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    scoped("roles", dashboard, token, |dashboard, _| async move { dashboard.roles().await }).await
}

pub async fn drives(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    scoped("drives", dashboard, token, |dashboard, _| async move { dashboard.drives().await }).await
}

pub async fn create_drive(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: CreateDriveRequest,
) -> Result<Response, Infallible> {
    admin("create-drive", dashboard, token, |dashboard| async move {
        dashboard.create_drive(request).await
    })
    .await
}

pub async fn teams(dashboard: Arc<Dashboard>, token: Option<String>) -> Result<Response, Infallible> {
    scoped("teams", dashboard, token, |dashboard, _| async move { dashboard.teams().await }).await
}

pub async fn send_access_emails(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    request: AccessEmailRequest,
) -> Result<Response, Infallible> {
    admin("send-access-email", dashboard, token, |dashboard| async move {
        dashboard.send_access_emails(request).await
    })
    .await
}

pub async fn validate_token(token: String, dashboard: Arc<Dashboard>) -> Result<Response, Infallible> {
    handle("validate-token", async move { dashboard.validate_token(&token).await }).await
}

pub async fn set_password(
    token: String,
    dashboard: Arc<Dashboard>,
    request: SetPasswordRequest,
) -> Result<Response, Infallible> {
    handle("set-password", async move {
        dashboard.set_password(&token, request).await
    })
    .await
}

pub async fn reset_password(
    dashboard: Arc<Dashboard>,
    request: ResetPasswordRequest,
) -> Result<Response, Infallible> {
    handle("reset-password", async move { dashboard.reset_password(request).await }).await
}

/// Check the caller may administer the directory, then run `operation`
async fn admin<T, F, Fut>(
    route: &'static str,
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    operation: F,
) -> Result<Response, Infallible>
where
    T: serde::Serialize,
    F: FnOnce(Arc<Dashboard>) -> Fut,
    Fut: std::future::Future<Output = DashboardResult<T>>,
{
    handle(route, async move {
        dashboard.require_admin(token.as_deref()).await?;
        operation(dashboard).await
    })
    .await
}

/// Resolve the viewer, then run an operation over what they may see
async fn scoped<T, F, Fut>(
    route: &'static str,
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    operation: F,
) -> Result<Response, Infallible>
where
    T: serde::Serialize,
    F: FnOnce(Arc<Dashboard>, Option<access::Viewer>) -> Fut,
    Fut: std::future::Future<Output = DashboardResult<T>>,
{
    handle(route, async move {
        let viewer = dashboard.viewer(token.as_deref()).await?;
        operation(dashboard, viewer).await
    })
    .await
}

pub async fn kpis(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    scope: RecordScope,
) -> Result<Response, Infallible> {
    scoped("kpis", dashboard, token, |dashboard, viewer| async move {
        dashboard.kpis(viewer.as_ref(), &scope).await
    })
    .await
}

pub async fn team_summaries(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    scope: RecordScope,
) -> Result<Response, Infallible> {
    scoped("analytics-teams", dashboard, token, |dashboard, viewer| async move {
        dashboard.team_summaries(viewer.as_ref(), &scope).await
    })
    .await
}

pub async fn bde_summaries(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    scope: RecordScope,
) -> Result<Response, Infallible> {
    scoped("analytics-bdes", dashboard, token, |dashboard, viewer| async move {
        dashboard.bde_summaries(viewer.as_ref(), &scope).await
    })
    .await
}

pub async fn monthly_chart(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    scope: RecordScope,
) -> Result<Response, Infallible> {
    scoped("analytics-monthly", dashboard, token, |dashboard, viewer| async move {
        dashboard.monthly_chart(viewer.as_ref(), &scope).await
    })
    .await
}

pub async fn top_achievers(
    dashboard: Arc<Dashboard>,
    token: Option<String>,
    query: TopAchieversQuery,
) -> Result<Response, Infallible> {
    scoped("top-achievers", dashboard, token, |dashboard, viewer| async move {
        dashboard
            .top_achievers(viewer.as_ref(), &query.scope(), query.count)
            .await
    })
    .await
}

pub async fn bde_chart(
    name: String,
    dashboard: Arc<Dashboard>,
    token: Option<String>,
) -> Result<Response, Infallible> {
    scoped("bde-chart", dashboard, token, |dashboard, viewer| async move {
        dashboard.bde_chart(viewer.as_ref(), &name).await
    })
    .await
}
