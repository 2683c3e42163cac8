use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub smm_panel: Option<SmmPanelConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared admin key, required when `method = "api_key"`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name recorded as `submitted_by` for requests authenticated by the key.
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

fn default_admin_name() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("spotlight.db")
}

/// Timing and rate constants for the campaign engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Hours after order creation before initial actions are overdue.
    #[serde(default = "default_deadline_hours")]
    pub deadline_hours: i64,
    /// Hours a completed action item stays visible before exclusion.
    #[serde(default = "default_grace_hours")]
    pub grace_hours: i64,
    /// Streams a single playlist placement yields per 24 hours.
    #[serde(default = "default_streams_per_playlist_per_day")]
    pub streams_per_playlist_per_day: i64,
    /// Compare-and-swap attempts for a single campaign mutation.
    #[serde(default = "default_max_update_retries")]
    pub max_update_retries: u32,
}

fn default_deadline_hours() -> i64 {
    48
}

fn default_grace_hours() -> i64 {
    8
}

fn default_streams_per_playlist_per_day() -> i64 {
    500
}

fn default_max_update_retries() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline_hours: default_deadline_hours(),
            grace_hours: default_grace_hours(),
            streams_per_playlist_per_day: default_streams_per_playlist_per_day(),
            max_update_retries: default_max_update_retries(),
        }
    }
}

/// SMM panel connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmmPanelConfig {
    /// Panel API endpoint (e.g., "https://followiz.com/api/v2")
    pub url: String,
    /// Panel API key. Empty means every panel call fails with a configuration error.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smm_panel: Option<SanitizedSmmPanelConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
}

/// Sanitized panel config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSmmPanelConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
            },
            server: config.server.clone(),
            database: config.database.clone(),
            engine: config.engine.clone(),
            smm_panel: config.smm_panel.as_ref().map(|p| SanitizedSmmPanelConfig {
                url: p.url.clone(),
                api_key_configured: !p.api_key.trim().is_empty(),
                timeout_secs: p.timeout_secs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let toml = r#"
[auth]
method = "none"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.auth.admin_name, "admin");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "spotlight.db");
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.smm_panel.is_none());
    }

    #[test]
    fn test_deserialize_api_key_auth() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "s3cret"
admin_name = "ops"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.admin_name, "ops");
    }

    #[test]
    fn test_deserialize_engine_overrides() {
        let toml = r#"
[auth]
method = "none"

[engine]
deadline_hours = 72
streams_per_playlist_per_day = 750
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.deadline_hours, 72);
        assert_eq!(config.engine.grace_hours, 8);
        assert_eq!(config.engine.streams_per_playlist_per_day, 750);
        assert_eq!(config.engine.max_update_retries, 3);
    }

    #[test]
    fn test_sanitized_config_hides_panel_key() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
                admin_name: "admin".to_string(),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            engine: EngineConfig::default(),
            smm_panel: Some(SmmPanelConfig {
                url: "https://panel.example.com/api/v2".to_string(),
                api_key: "secret-key".to_string(),
                timeout_secs: 10,
            }),
        };

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "none");
        let panel = sanitized.smm_panel.unwrap();
        assert!(panel.api_key_configured);
        assert_eq!(panel.timeout_secs, 10);

        let json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap();
        assert!(!json.contains("secret-key"));
    }

    #[test]
    fn test_sanitized_config_blank_key_not_configured() {
        let config: Config = toml::from_str(
            r#"
[auth]
method = "none"

[smm_panel]
url = "https://panel.example.com/api/v2"
api_key = "   "
"#,
        )
        .unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.smm_panel.unwrap().api_key_configured);
    }
}
