//! Configuration for the dashboard service
//!
//! Settings come from a TOML file with per-field defaults, followed by a small
//! set of environment overrides (`PORT`, `FRONTEND_URL`, `DATA_FILE`) so the
//! service can run in a container without a config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main dashboard configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub auth: AuthSection,
    /// Branches known to the organisation
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin; any origin when unset
    pub frontend_url: Option<String>,
    /// Port for the health and metrics endpoints
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            frontend_url: None,
            health_port: default_health_port(),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    /// SQLite database file; the store is memory-only when unset
    pub data_file: Option<PathBuf>,
}

/// Spreadsheet upload settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadSection {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_fiscal_year")]
    pub default_fiscal_year: String,
    #[serde(default = "default_drive_name")]
    pub drive_name: String,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            default_fiscal_year: default_fiscal_year(),
            drive_name: default_drive_name(),
        }
    }
}

/// Credential and session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Lifetime of set-password links for admin-created users
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,
    /// Lifetime of links issued through the access e-mail flow
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,
    /// Reject data and analytics requests without a bearer session
    #[serde(default)]
    pub require_session: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: default_pbkdf2_iterations(),
            session_ttl_secs: default_session_ttl(),
            reset_token_ttl_secs: default_reset_token_ttl(),
            access_token_ttl_secs: default_access_token_ttl(),
            require_session: false,
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_health_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_fiscal_year() -> String {
    "2025".to_string()
}

fn default_drive_name() -> String {
    "2025 Performance".to_string()
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

fn default_session_ttl() -> u64 {
    12 * 60 * 60
}

fn default_reset_token_ttl() -> u64 {
    60 * 60
}

fn default_access_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_branches() -> Vec<String> {
    vec!["Hyderabad Branch".to_string(), "Mumbai Branch".to_string()]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            storage: StorageSection::default(),
            upload: UploadSection::default(),
            auth: AuthSection::default(),
            branches: default_branches(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DashboardConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text, then apply environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: DashboardConfig = toml::from_str(content)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, used when no file is found
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `FRONTEND_URL` and `DATA_FILE` from the given lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidConfig(format!("PORT '{port}' is not a port")))?;
        }
        if let Some(url) = lookup("FRONTEND_URL").filter(|u| !u.trim().is_empty()) {
            self.server.frontend_url = Some(url.trim().to_string());
        }
        if let Some(path) = lookup("DATA_FILE").filter(|p| !p.trim().is_empty()) {
            self.storage.data_file = Some(PathBuf::from(path.trim()));
        }
        Ok(())
    }

    /// Check values that would make the service unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.branches.is_empty() || self.branches.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "branches must list at least one non-blank branch".to_string(),
            ));
        }
        if self.auth.pbkdf2_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "auth.pbkdf2_iterations must be non-zero".to_string(),
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "upload.max_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Address the API server binds to
    pub fn api_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|e| ConfigError::InvalidConfig(format!("bad bind address: {e}")))
    }

    /// Whether `branch` is one of the configured branches
    pub fn is_known_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: DashboardConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upload.default_fiscal_year, "2025");
        assert_eq!(config.upload.drive_name, "2025 Performance");
        assert_eq!(config.auth.reset_token_ttl_secs, 3600);
        assert_eq!(config.auth.access_token_ttl_secs, 86400);
        assert!(!config.auth.require_session);
        assert_eq!(config.branches, vec!["Hyderabad Branch", "Mumbai Branch"]);
        assert!(config.storage.data_file.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let toml_content = r#"
branches = ["Pune Branch"]

[server]
bind_address = "127.0.0.1"
port = 4000
frontend_url = "https://dash.example.com"

[storage]
data_file = "/var/lib/salespulse/salespulse.db"

[upload]
max_bytes = 2048
default_fiscal_year = "2026"
drive_name = "Spring Drive"

[auth]
pbkdf2_iterations = 5000
session_ttl_secs = 60
require_session = true
"#;
        let config: DashboardConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(
            config.server.frontend_url.as_deref(),
            Some("https://dash.example.com")
        );
        assert_eq!(
            config.storage.data_file,
            Some(PathBuf::from("/var/lib/salespulse/salespulse.db"))
        );
        assert_eq!(config.upload.default_fiscal_year, "2026");
        assert_eq!(config.auth.session_ttl_secs, 60);
        assert!(config.auth.require_session);
        assert_eq!(config.branches, vec!["Pune Branch"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DashboardConfig::default();
        config
            .apply_env_overrides(|name| match name {
                "PORT" => Some("5050".to_string()),
                "FRONTEND_URL" => Some("http://localhost:5173".to_string()),
                "DATA_FILE" => Some("/tmp/salespulse.db".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server.port, 5050);
        assert_eq!(
            config.server.frontend_url.as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(
            config.storage.data_file,
            Some(PathBuf::from("/tmp/salespulse.db"))
        );
    }

    #[test]
    fn test_bad_port_override_is_rejected() {
        let mut config = DashboardConfig::default();
        let result = config.apply_env_overrides(|name| {
            (name == "PORT").then(|| "not-a-port".to_string())
        });

        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_rejects_empty_branches() {
        let config = DashboardConfig {
            branches: vec![],
            ..DashboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_iterations() {
        let mut config = DashboardConfig::default();
        config.auth.pbkdf2_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 3100").unwrap();

        let config = DashboardConfig::load_from_file(file.path()).unwrap();
        assert!(config.server.port == 3100 || std::env::var("PORT").is_ok());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = DashboardConfig::load_from_file(Path::new("/nonexistent/dashboard.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result: Result<DashboardConfig, _> = toml::from_str("[server\nport = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_known_branch() {
        let config = crate::testing::fixtures::test_config();
        assert!(config.is_known_branch("Mumbai Branch"));
        assert!(!config.is_known_branch("mumbai branch"));
    }
}
