//! Test helpers and utilities for integration tests

use salespulse::dashboard::Dashboard;
use salespulse::model::{Role, SalesRecord, User};
use salespulse::store::MemoryStore;
use salespulse::testing::fixtures::test_config;
use std::sync::Arc;

pub const BOUNDARY: &str = "salespulse-test-boundary";

/// Dashboard over an in-memory store seeded with `records` and `users`
#[allow(dead_code)]
pub fn test_dashboard(records: Vec<SalesRecord>, users: Vec<User>) -> Arc<Dashboard> {
    let store = MemoryStore::from_parts(records, users, vec![]);
    Arc::new(Dashboard::new(Arc::new(store), test_config()))
}

/// Like [`test_dashboard`], but every data and admin route needs a session
#[allow(dead_code)]
pub fn secured_dashboard(records: Vec<SalesRecord>, users: Vec<User>) -> Arc<Dashboard> {
    let mut config = test_config();
    config.auth.require_session = true;
    let store = MemoryStore::from_parts(records, users, vec![]);
    Arc::new(Dashboard::new(Arc::new(store), config))
}

/// Store a user who can log in with `password`
#[allow(dead_code)]
pub async fn with_login(dashboard: &Dashboard, name: &str, role: Role, branch: &str, password: &str) {
    let mut user = salespulse::testing::fixtures::user(name, role, branch);
    let hasher = salespulse::auth::PasswordHasher::new(dashboard.config().auth.pbkdf2_iterations);
    user.password_hash = Some(hasher.hash(password));
    dashboard.store().save_user(user).await.unwrap();
}

/// Multipart body with an optional `branch` field and one CSV `excelFile` part
#[allow(dead_code)]
pub fn multipart_body(file_name: &str, content: &str, branch: Option<&str>) -> Vec<u8> {
    multipart_file(file_name, "text/csv", content.as_bytes(), branch)
}

/// Multipart body carrying arbitrary file bytes
#[allow(dead_code)]
pub fn multipart_file(file_name: &str, content_type: &str, bytes: &[u8], branch: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(branch) = branch {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"branch\"\r\n\r\n{branch}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"excelFile\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Log in through the API and return the `Authorization` header value
#[allow(dead_code)]
pub async fn bearer<F>(api: &F, user_id: &str, password: &str) -> String
where
    F: warp::Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .method("POST")
        .path("/api/login")
        .json(&serde_json::json!({ "userId": user_id, "password": password }))
        .reply(api)
        .await;
    assert_eq!(response.status(), warp::http::StatusCode::OK, "login failed for {user_id}");
    format!("Bearer {}", json(&response)["token"].as_str().unwrap())
}

#[allow(dead_code)]
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

#[allow(dead_code)]
pub fn json(response: &warp::http::Response<bytes::Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).unwrap()
}
