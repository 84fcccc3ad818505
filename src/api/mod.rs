//! JSON API served with warp
//!
//! Every route resolves to one [`Dashboard`] operation. Successful results are
//! rendered as JSON; a [`DashboardError`](crate::error::DashboardError) becomes
//! `{ "success": false, "error": ... }` with the error's status code.

mod handlers;
mod reply;
pub mod upload;

use crate::analytics::RecordScope;
use crate::auth::bearer_token;
use crate::dashboard::*;
use handlers::TopAchieversQuery;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use warp::http::Method;
use warp::{Filter, Rejection, Reply};

pub use reply::handle_rejection;

/// Headroom over the upload limit for the multipart envelope
const MULTIPART_OVERHEAD: u64 = 64 * 1024;
const JSON_BODY_LIMIT: u64 = 1024 * 1024;

fn with_dashboard(
    dashboard: Arc<Dashboard>,
) -> impl Filter<Extract = (Arc<Dashboard>,), Error = Infallible> + Clone {
    warp::any().map(move || dashboard.clone())
}

/// Bearer token from the `Authorization` header, if any
fn session_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .map(|header: Option<String>| header.as_deref().and_then(bearer_token).map(str::to_string))
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// Path segment with `%XX` escapes decoded
fn name_param() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::path::param::<String>().map(|raw: String| percent_decode(&raw))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Every API route, with CORS and error recovery applied
pub fn routes(
    dashboard: Arc<Dashboard>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let upload_limit = dashboard.config().upload.max_bytes + MULTIPART_OVERHEAD;
    let cors = cors(dashboard.config().server.frontend_url.as_deref());
    let api = warp::path("api");

    let login = api
        .clone()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(json_body::<LoginRequest>())
        .and_then(handlers::login);

    let logout = api
        .clone()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::logout);

    let data = api
        .clone()
        .and(warp::path("data"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::data);

    let access = api
        .clone()
        .and(warp::path("access"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::access);

    let upload = api
        .clone()
        .and(warp::path("upload-excel"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::multipart::form().max_length(upload_limit))
        .and_then(handlers::upload);

    let cleanup = api
        .clone()
        .and(warp::path("cleanup-duplicates"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::cleanup_duplicates);

    let list_users = api
        .clone()
        .and(warp::path("users"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::users);

    let create_user = api
        .clone()
        .and(warp::path("users"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<CreateUserRequest>())
        .and_then(handlers::create_user);

    let update_user = api
        .clone()
        .and(warp::path("users"))
        .and(name_param())
        .and(warp::path::end())
        .and(warp::put())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<UpdateUserRequest>())
        .and_then(handlers::update_user);

    let update_role = api
        .clone()
        .and(warp::path!("user" / "role"))
        .and(warp::put())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<UpdateRoleRequest>())
        .and_then(handlers::update_role);

    let bde_team = api
        .clone()
        .and(warp::path("bde-team"))
        .and(warp::path::end())
        .and(warp::put())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<BdeTeamRequest>())
        .and_then(handlers::update_bde_team);

    let team_name = api
        .clone()
        .and(warp::path("team-name"))
        .and(warp::path::end())
        .and(warp::put())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<TeamNameRequest>())
        .and_then(handlers::update_team_name);

    let bde_names = api
        .clone()
        .and(warp::path("bde-names"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::bde_names);

    let roles = api
        .clone()
        .and(warp::path("roles"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::roles);

    let list_drives = api
        .clone()
        .and(warp::path("drives"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::drives);

    let create_drive = api
        .clone()
        .and(warp::path("drives"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<CreateDriveRequest>())
        .and_then(handlers::create_drive);

    let teams = api
        .clone()
        .and(warp::path("teams"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and_then(handlers::teams);

    let access_email = api
        .clone()
        .and(warp::path("send-access-email"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(json_body::<AccessEmailRequest>())
        .and_then(handlers::send_access_emails);

    let validate_token = api
        .clone()
        .and(warp::path("set-password"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and_then(handlers::validate_token);

    let set_password = api
        .clone()
        .and(warp::path("set-password"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(json_body::<SetPasswordRequest>())
        .and_then(handlers::set_password);

    let reset_password = api
        .clone()
        .and(warp::path!("auth" / "reset-password"))
        .and(warp::post())
        .and(with_dashboard(dashboard.clone()))
        .and(json_body::<ResetPasswordRequest>())
        .and_then(handlers::reset_password);

    let analytics = api.and(warp::path("analytics"));

    let kpis = analytics
        .clone()
        .and(warp::path("kpis"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::query::<RecordScope>())
        .and_then(handlers::kpis);

    let team_summaries = analytics
        .clone()
        .and(warp::path("teams"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::query::<RecordScope>())
        .and_then(handlers::team_summaries);

    let bde_summaries = analytics
        .clone()
        .and(warp::path("bdes"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::query::<RecordScope>())
        .and_then(handlers::bde_summaries);

    let monthly = analytics
        .clone()
        .and(warp::path("monthly"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::query::<RecordScope>())
        .and_then(handlers::monthly_chart);

    let top_achievers = analytics
        .clone()
        .and(warp::path("top-achievers"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard.clone()))
        .and(session_token())
        .and(warp::query::<TopAchieversQuery>())
        .and_then(handlers::top_achievers);

    let bde_chart = analytics
        .clone()
        .and(warp::path("bde"))
        .and(name_param())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_dashboard(dashboard))
        .and(session_token())
        .and_then(handlers::bde_chart);

    let session_routes = login.or(logout).or(access).boxed();
    let record_routes = data
        .or(upload)
        .or(cleanup)
        .or(bde_team)
        .or(team_name)
        .or(list_drives)
        .or(create_drive)
        .or(teams)
        .boxed();
    let user_routes = list_users
        .or(create_user)
        .or(update_user)
        .or(update_role)
        .or(bde_names)
        .or(roles)
        .or(access_email)
        .or(validate_token)
        .or(set_password)
        .or(reset_password)
        .boxed();
    let analytics_routes = kpis
        .or(team_summaries)
        .or(bde_summaries)
        .or(monthly)
        .or(top_achievers)
        .or(bde_chart)
        .boxed();

    session_routes
        .or(record_routes)
        .or(user_routes)
        .or(analytics_routes)
        .recover(handle_rejection)
        .with(cors)
}

/// CORS for the configured front end, or any origin when none is set
fn cors(frontend_url: Option<&str>) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(&[Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(vec!["content-type", "authorization"]);

    let origin = frontend_url
        .and_then(|raw| url::Url::parse(raw).ok())
        .map(|url| url.origin().ascii_serialization())
        .filter(|origin| origin != "null");
    match origin {
        Some(origin) => builder.allow_origin(origin.as_str()),
        None => builder.allow_any_origin(),
    }
}

/// Bind the API and serve it until `shutdown` resolves
pub async fn serve(
    dashboard: Arc<Dashboard>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), warp::Error> {
    let (bound, server) =
        warp::serve(routes(dashboard)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!(address = %bound, "API listening");
    server.await;
    info!("API stopped");
    Ok(())
}
