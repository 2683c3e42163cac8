use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Engine timing constants are positive
/// - API key auth carries a key
/// - A configured panel has a URL (a missing panel key is reported per call instead)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let engine = &config.engine;
    if engine.deadline_hours <= 0 {
        return Err(ConfigError::ValidationError(
            "engine.deadline_hours must be positive".to_string(),
        ));
    }
    if engine.grace_hours <= 0 {
        return Err(ConfigError::ValidationError(
            "engine.grace_hours must be positive".to_string(),
        ));
    }
    if engine.streams_per_playlist_per_day <= 0 {
        return Err(ConfigError::ValidationError(
            "engine.streams_per_playlist_per_day must be positive".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config
            .auth
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when method = \"api_key\"".to_string(),
        ));
    }

    if let Some(panel) = &config.smm_panel {
        if panel.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "smm_panel.url cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
