//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (STAGEPASS_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "stagepass.toml",
    ".stagepass.toml",
    "~/.config/stagepass/config.toml",
    "/etc/stagepass/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Defaults come from serde defaults on AppConfig

    // 2. Configuration file
    if let Some(path) = config_path {
        // Explicit path provided, must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Environment variables with STAGEPASS_ prefix
    // Double underscore (__) maps to nested keys, e.g.
    // STAGEPASS_SERVER__PORT -> server.port
    builder = builder.add_source(
        Environment::with_prefix("STAGEPASS")
            .separator("__")
            .try_parsing(true),
    );

    // 4. Convenience variables for the two secrets
    if let Ok(secret) = std::env::var("STAGEPASS_ADMIN_SECRET") {
        builder = builder
            .set_override("auth.admin_secret", secret)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }
    if let Ok(secret) = std::env::var("STAGEPASS_TOKEN_SECRET") {
        builder = builder
            .set_override("auth.token.secret", secret)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
///
/// Runs before serving traffic; every violation here is a startup failure.
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    match &config.auth.admin_secret {
        None => {
            return Err(ConfigError::Missing {
                field: "auth.admin_secret (set STAGEPASS_ADMIN_SECRET)".to_string(),
            });
        }
        Some(secret) if secret.is_empty() => {
            return Err(ConfigError::Invalid {
                message: "auth.admin_secret must not be empty".to_string(),
            });
        }
        Some(_) => {}
    }

    match &config.auth.token.secret {
        None => {
            return Err(ConfigError::Missing {
                field: "auth.token.secret (set STAGEPASS_TOKEN_SECRET)".to_string(),
            });
        }
        Some(secret) if secret.is_empty() => {
            return Err(ConfigError::Invalid {
                message: "auth.token.secret must not be empty".to_string(),
            });
        }
        Some(_) => {}
    }

    if config.auth.token.ttl_minutes <= 0 {
        return Err(ConfigError::Invalid {
            message: "auth.token.ttl_minutes must be greater than 0".to_string(),
        });
    }

    Ok(())
}
