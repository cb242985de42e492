use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a plain
/// `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let awin_api_key = require("AFFDB_AWIN_API_KEY")?;
    let awin_feed_id = require("AFFDB_AWIN_FEED_ID")?;

    let env = parse_environment(&or_default("AFFDB_ENV", "development"))?;
    let log_level = or_default("AFFDB_LOG_LEVEL", "info");
    let partner_name = or_default("AFFDB_PARTNER_NAME", "AWIN");
    let feed_language = or_default("AFFDB_FEED_LANGUAGE", "de");
    let cache_dir = PathBuf::from(or_default("AFFDB_CACHE_DIR", "./tmp/productdb"));

    let parse_positive = |var: &str, default: &str| -> Result<u64, ConfigError> {
        match parse_u64(var, default)? {
            0 => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            n => Ok(n),
        }
    };

    let feed_max_age_secs = parse_positive("AFFDB_FEED_MAX_AGE_SECS", "86400")?;
    let http_timeout_secs = parse_positive("AFFDB_HTTP_TIMEOUT_SECS", "300")?;
    let user_agent = or_default("AFFDB_USER_AGENT", "affdb/0.1 (product-feed)");

    Ok(AppConfig {
        env,
        log_level,
        awin_api_key,
        awin_feed_id,
        partner_name,
        feed_language,
        cache_dir,
        feed_max_age_secs,
        http_timeout_secs,
        user_agent,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AFFDB_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
