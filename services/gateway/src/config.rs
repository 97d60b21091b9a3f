//! services/gateway/src/config.rs
//!
//! Defines the gateway's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use file_search_core::token::MIN_SECRET_LEN;
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
    pub log_level: Level,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub file_search_store_name: String,
    pub prompt_path: PathBuf,
    pub users_file: PathBuf,
    pub upload_dir: PathBuf,
    pub session_secret: Option<String>,
    pub cookie_secure: bool,
    pub allowed_origin: Option<String>,
    pub max_upload_bytes: usize,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub pagination_max_pages: usize,
    pub store_page_size: u32,
    pub document_page_size: u32,
    pub request_timeout: Duration,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote Service Settings ---
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let gemini_model = var("GEMINI_MODEL", "gemini-2.5-flash");
        let gemini_base_url = var(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com",
        )
        .trim_end_matches('/')
        .to_string();
        let file_search_store_name = var("FILE_SEARCH_STORE_NAME", "my-documents-store");

        // --- Files ---
        let prompt_path = PathBuf::from(var("PROMPT_PATH", "./prompt.md"));
        let users_file = PathBuf::from(var("USERS_FILE", "./users.json"));
        let upload_dir = PathBuf::from(var("UPLOAD_DIR", "./uploads"));

        // --- Sessions ---
        let session_secret = lookup("SESSION_SECRET").filter(|s| !s.is_empty());
        if let Some(secret) = &session_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::InvalidValue(
                    "SESSION_SECRET".to_string(),
                    format!("must be at least {} bytes long", MIN_SECRET_LEN),
                ));
            }
        }
        let cookie_secure = parse_bool("COOKIE_SECURE", &var("COOKIE_SECURE", "false"))?;
        let allowed_origin = lookup("ALLOWED_ORIGIN").filter(|o| !o.is_empty());

        // --- Limits ---
        let max_upload_bytes =
            parse_positive("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "104857600"))?;
        let poll_interval =
            Duration::from_millis(parse("POLL_INTERVAL_MS", &var("POLL_INTERVAL_MS", "1000"))?);
        let poll_max_attempts =
            parse_positive("POLL_MAX_ATTEMPTS", &var("POLL_MAX_ATTEMPTS", "600"))?;
        let pagination_max_pages =
            parse_positive("PAGINATION_MAX_PAGES", &var("PAGINATION_MAX_PAGES", "1000"))?;
        let store_page_size = parse_positive("STORE_PAGE_SIZE", &var("STORE_PAGE_SIZE", "10"))?;
        let document_page_size =
            parse_positive("DOCUMENT_PAGE_SIZE", &var("DOCUMENT_PAGE_SIZE", "20"))?;
        let request_timeout = Duration::from_secs(parse_positive(
            "REQUEST_TIMEOUT_SECS",
            &var("REQUEST_TIMEOUT_SECS", "120"),
        )?);

        Ok(Self {
            bind_address,
            log_level,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            file_search_store_name,
            prompt_path,
            users_file,
            upload_dir,
            session_secret,
            cookie_secure,
            allowed_origin,
            max_upload_bytes,
            poll_interval,
            poll_max_attempts,
            pagination_max_pages,
            store_page_size,
            document_page_size,
            request_timeout,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Counts and sizes where zero would stall polling or paging.
fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let parsed: T = parse(key, value)?;
    if parsed == T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(parsed)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_the_documented_values() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.file_search_store_name, "my-documents-store");
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.store_page_size, 10);
        assert!(!config.cookie_secure);
        assert!(config.session_secret.is_none());
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::MissingVar(var)) if var == "GEMINI_API_KEY"
        ));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("POLL_INTERVAL_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "POLL_INTERVAL_MS"));

        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("SESSION_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "SESSION_SECRET"));
    }

    #[test]
    fn zero_limits_are_refused() {
        for key in [
            "POLL_MAX_ATTEMPTS",
            "STORE_PAGE_SIZE",
            "DOCUMENT_PAGE_SIZE",
            "PAGINATION_MAX_PAGES",
            "MAX_UPLOAD_BYTES",
            "REQUEST_TIMEOUT_SECS",
        ] {
            let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), (key, "0")]))
                .unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(var, reason) if var == key && reason.contains("zero")),
                "{}: {:?}",
                key,
                err
            );
        }

        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("POLL_MAX_ATTEMPTS", "1"),
            ("POLL_INTERVAL_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.poll_max_attempts, 1);
        assert_eq!(config.poll_interval, Duration::ZERO);
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://127.0.0.1:9000/"),
            ("COOKIE_SECURE", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.gemini_base_url, "http://127.0.0.1:9000");
        assert!(config.cookie_secure);
    }
}
