//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Key for the generative-language API. Gemini takes precedence over OpenAI.
    pub ai_api_key: Option<String>,
    pub ai_api_base: String,
    pub analysis_model: String,
    pub blob_root: PathBuf,
    pub public_base_url: String,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    pub max_body_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative-language API (key is optional here, checked at startup) ---
        let ai_api_key = var("GEMINI_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        let ai_api_base = var("AI_API_BASE").unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
        });
        let analysis_model =
            var("ANALYSIS_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());

        // --- Storage and HTTP Settings ---
        let blob_root = var("BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./blobs"));
        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3001".to_string());

        let session_ttl_days = parse_number(&var, "SESSION_TTL_DAYS", 30)?;
        let max_body_bytes = parse_number(&var, "MAX_BODY_BYTES", 50 * 1024 * 1024)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            ai_api_key,
            ai_api_base,
            analysis_model,
            blob_root,
            public_base_url,
            cors_origin,
            session_ttl_days,
            max_body_bytes,
        })
    }
}

fn parse_number<F, T>(var: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/planner")]).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.analysis_model, "gemini-2.0-flash");
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.max_body_bytes, 50 * 1024 * 1024);
        assert!(config.ai_api_key.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn gemini_key_wins_over_openai_key() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "gm-key"),
        ])
        .unwrap();
        assert_eq!(config.ai_api_key.as_deref(), Some("gm-key"));
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = load(&[("DATABASE_URL", "postgres://x"), ("SESSION_TTL_DAYS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "SESSION_TTL_DAYS"));

        let err = load(&[("DATABASE_URL", "postgres://x"), ("BIND_ADDRESS", "nowhere")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "BIND_ADDRESS"));
    }

    #[test]
    fn public_base_url_loses_trailing_slash() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("PUBLIC_BASE_URL", "https://planner.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.public_base_url, "https://planner.example.com");
    }
}
