//! Delivery of password set-up links
//!
//! Links are handed to a [`Notifier`]; the bundled implementation only logs
//! them so an operator can forward them by hand.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
    /// Issued when an admin creates or overwrites a user
    PasswordSetup,
    /// Issued through the bulk access e-mail action
    Access,
}

/// A password link addressed to one user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLink {
    pub kind: LinkKind,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub link: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, link: &AccessLink);
}

/// Notifier that writes links to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, link: &AccessLink) {
        info!(
            kind = ?link.kind,
            user = %link.name,
            email = link.email.as_deref().unwrap_or("-"),
            role = %link.role,
            link = %link.link,
            "Password link issued"
        );
    }
}

/// Link for the front end's set-password page
pub fn set_password_link(frontend_url: Option<&str>, token: &str) -> String {
    let base = frontend_url.unwrap_or("").trim_end_matches('/');
    format!("{base}/set-password?token={token}")
}
