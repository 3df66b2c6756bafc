use crate::app_config::{AppConfig, Environment};
use crate::sales::{DEFAULT_EXCLUDED_CFOPS, DEFAULT_EXCLUDED_SELLERS};
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
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_flag(&raw)
                .ok_or_else(|| invalid(var, format!("expected true/false, got '{raw}'"))),
        }
    };

    let parse_list = |var: &str, default: &[&str]| -> Vec<String> {
        match lookup(var) {
            Ok(raw) => split_list(&raw),
            Err(_) => default.iter().map(|s| (*s).to_string()).collect(),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("CAMPDASH_ENV", "development"))?;

    let bind_addr = parse_addr("CAMPDASH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CAMPDASH_LOG_LEVEL", "info");
    let campaigns_path = PathBuf::from(or_default("CAMPDASH_CAMPAIGNS_PATH", "./campanhas.csv"));
    let catalog_dir = PathBuf::from(or_default("CAMPDASH_CATALOG_DIR", "./catalog"));

    let db_schema = or_default("CAMPDASH_DB_SCHEMA", "D-1");
    if !is_valid_schema_name(&db_schema) {
        return Err(invalid(
            "CAMPDASH_DB_SCHEMA",
            format!("'{db_schema}' may only contain ASCII letters, digits, '_' or '-'"),
        ));
    }

    let db_max_connections = parse_u32("CAMPDASH_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("CAMPDASH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CAMPDASH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let legacy_scope = parse_bool("CAMPDASH_LEGACY_SCOPE", false)?;
    let excluded_sellers = parse_list("CAMPDASH_EXCLUDED_SELLERS", DEFAULT_EXCLUDED_SELLERS);
    let excluded_cfops = parse_list("CAMPDASH_EXCLUDED_CFOPS", DEFAULT_EXCLUDED_CFOPS);

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        campaigns_path,
        catalog_dir,
        db_schema,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        legacy_scope,
        excluded_sellers,
        excluded_cfops,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CAMPDASH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Accepts `True`/`False` as stored in the campaign file plus common shell spellings.
pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// The schema name is interpolated into SQL as a quoted identifier, so it is
/// restricted to a conservative character set.
#[must_use]
pub fn is_valid_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
