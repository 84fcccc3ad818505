//! Password hashing, bearer sessions and one-time password tokens

use crate::access::Viewer;
use crate::error::{DashboardError, DashboardResult};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

pub const MIN_PASSWORD_LEN: usize = 6;
const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_BYTES: usize = 32;

/// PBKDF2-HMAC-SHA256 password hashing.
///
/// Encoded as `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>` so the
/// iteration count can be raised without invalidating stored hashes.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = derive_key(password, &salt, self.iterations);
        format!(
            "{HASH_SCHEME}${}${}${}",
            self.iterations,
            B64.encode(salt),
            B64.encode(key)
        )
    }

    /// Malformed hashes never verify
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(HASH_SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (B64.decode(salt), B64.decode(hash)) else {
            return false;
        };
        if iterations == 0 || expected.len() != KEY_LEN {
            return false;
        }

        let key = derive_key(password, &salt, iterations);
        constant_time_eq(&key, &expected)
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn validate_password(password: &str) -> DashboardResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DashboardError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }
    Ok(())
}

/// Random 32-byte token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a token, hex encoded. Only this form is ever stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued one-time token: the plain value goes to the user, the
/// hash and expiry to the directory
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub hash: String,
    pub expires: DateTime<Utc>,
}

pub fn issue_token(ttl: Duration) -> IssuedToken {
    let token = generate_token();
    IssuedToken {
        hash: hash_token(&token),
        token,
        expires: Utc::now() + ttl,
    }
}

#[derive(Debug, Clone)]
struct Session {
    viewer: Viewer,
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// In-memory bearer sessions keyed by token hash
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session, returning the bearer token and its expiry
    pub async fn create(&self, viewer: Viewer, user_id: &str) -> (String, DateTime<Utc>) {
        let issued = issue_token(self.ttl);
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > Utc::now());
        sessions.insert(
            issued.hash,
            Session {
                viewer,
                user_id: user_id.to_string(),
                expires_at: issued.expires,
            },
        );
        (issued.token, issued.expires)
    }

    pub async fn resolve(&self, token: &str) -> Option<Viewer> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&hash_token(token))
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.viewer.clone())
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(&hash_token(token)).is_some()
    }

    /// Drop every session of a user, e.g. after a password change
    pub async fn revoke_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(user_id, removed, "Sessions revoked");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use proptest::prelude::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1000)
    }

    #[test]
    fn test_hash_and_verify() {
        let encoded = hasher().hash("hunter22");
        assert!(encoded.starts_with("pbkdf2-sha256$1000$"));
        assert!(hasher().verify("hunter22", &encoded));
        assert!(!hasher().verify("hunter23", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hasher().hash("same"), hasher().hash("same"));
    }

    #[test]
    fn test_iterations_come_from_the_hash() {
        let encoded = PasswordHasher::new(2000).hash("secret1");
        assert!(PasswordHasher::new(5).verify("secret1", &encoded));
    }

    #[test]
    fn test_malformed_hashes_never_verify() {
        for bad in [
            "",
            "plaintext",
            "$2b$10$abcdefghijklmnopqrstuv",
            "pbkdf2-sha256$0$AAAA$AAAA",
            "pbkdf2-sha256$abc$AAAA$AAAA",
            "pbkdf2-sha256$1000$!!!$AAAA",
            "pbkdf2-sha256$1000$AAAA$AAAA",
            "pbkdf2-sha256$1000$AAAA$AAAA$extra",
        ] {
            assert!(!hasher().verify("anything", bad), "verified: {bad}");
        }
    }

    #[test]
    fn test_password_length_rule() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = SessionStore::new(Duration::hours(1));
        let viewer = Viewer::new("Asha", Role::TeamLeader, vec!["Mumbai Branch".into()]);

        let (token, expires) = sessions.create(viewer.clone(), "user-1").await;
        assert!(expires > Utc::now());
        assert_eq!(sessions.resolve(&token).await, Some(viewer));
        assert_eq!(sessions.resolve("nope").await, None);

        assert_eq!(sessions.revoke_user("user-1").await, 1);
        assert_eq!(sessions.resolve(&token).await, None);
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_sessions_do_not_resolve() {
        let sessions = SessionStore::new(Duration::seconds(-1));
        let viewer = Viewer::new("Asha", Role::Admin, vec![]);
        let (token, _) = sessions.create(viewer, "user-1").await;
        assert_eq!(sessions.resolve(&token).await, None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_verify_round_trips(password in "\\PC{1,24}") {
            let h = PasswordHasher::new(10);
            let encoded = h.hash(&password);
            prop_assert!(h.verify(&password, &encoded));
        }
    }
}
