//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `APIQ_BASE_URL` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `APIQ_BASE_URL`: Scheme and host of the API (required)
//! - `APIQ_VERSION`: Version path segment
//! - `APIQ_RPS`: Calls allowed per second
//! - `APIQ_RETRIES`: Retries after the first attempt
//! - `APIQ_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `APIQ_USER_AGENT`: User agent sent with every request
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./apiq.toml` or `./apiq.json` (current working directory)
//! 2. `../apiq.toml` or `../apiq.json` (parent directory)
//! 3. `../../apiq.toml` or `../../apiq.json` (grandparent directory)
//! 4. Next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use apiq_domain::{ApiqError, ClientConfig, Result};

const CONFIG_FILE_NAMES: [&str; 2] = ["apiq.toml", "apiq.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails,
/// falls back to a config file.
///
/// # Errors
/// Returns `ApiqError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Values fail validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `APIQ_BASE_URL` is required; every other variable overrides a
/// default of [`ClientConfig::new`].
///
/// # Errors
/// Returns `ApiqError::Config` if `APIQ_BASE_URL` is missing, a numeric
/// variable does not parse (negative values included), or the result fails
/// validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("APIQ_BASE_URL")?);

    if let Some(version) = env_opt("APIQ_VERSION") {
        config = config.with_version(version);
    }
    if let Some(rps) = env_parse::<u32>("APIQ_RPS")? {
        config = config.with_rps(rps);
    }
    if let Some(retries) = env_parse::<u32>("APIQ_RETRIES")? {
        config = config.with_retries(retries);
    }
    if let Some(timeout_ms) = env_parse::<u64>("APIQ_TIMEOUT_MS")? {
        config = config.with_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(agent) = env_opt("APIQ_USER_AGENT") {
        config = config.with_user_agent(agent);
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ApiqError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Values fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ApiqError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ApiqError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ApiqError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); a path
/// without an extension is read as JSON. Values are not validated.
///
/// # Errors
/// Returns `ApiqError::Config` if format is unsupported or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ApiqError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ApiqError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ApiqError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `ApiqError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| ApiqError::Config(format!("Missing required environment variable: {key}")))
}

/// Optional environment variable; empty values count as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `ApiqError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ApiqError::Config(format!("Invalid {key} value {raw:?}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    pub(crate) static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const APIQ_VARS: [&str; 6] = [
        "APIQ_BASE_URL",
        "APIQ_VERSION",
        "APIQ_RPS",
        "APIQ_RETRIES",
        "APIQ_TIMEOUT_MS",
        "APIQ_USER_AGENT",
    ];

    fn clear_apiq_env() {
        for key in APIQ_VARS {
            std::env::remove_var(key);
        }
    }

    fn write_with_extension(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().expect("temp file");
        temp_file.write_all(contents.as_bytes()).expect("write temp file");
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).expect("copy temp file");
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        std::env::set_var("APIQ_TEST_BOOL_TRUE", "Yes");
        std::env::set_var("APIQ_TEST_BOOL_FALSE", "off");
        std::env::remove_var("APIQ_TEST_BOOL_MISSING");

        assert!(env_bool("APIQ_TEST_BOOL_TRUE", false));
        assert!(!env_bool("APIQ_TEST_BOOL_FALSE", true));
        assert!(env_bool("APIQ_TEST_BOOL_MISSING", true));
        assert!(!env_bool("APIQ_TEST_BOOL_MISSING", false));

        std::env::remove_var("APIQ_TEST_BOOL_TRUE");
        std::env::remove_var("APIQ_TEST_BOOL_FALSE");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_apiq_env();

        std::env::set_var("APIQ_BASE_URL", "https://api.example.com");
        std::env::set_var("APIQ_VERSION", "v2");
        std::env::set_var("APIQ_RPS", "4");
        std::env::set_var("APIQ_RETRIES", "5");
        std::env::set_var("APIQ_TIMEOUT_MS", "1500");
        std::env::set_var("APIQ_USER_AGENT", "apiq-tests/1.0");

        let result = load_from_env();
        clear_apiq_env();

        let config = result.expect("config from env");
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.version.as_deref(), Some("v2"));
        assert_eq!(config.rate_limit.max_calls, 4);
        assert_eq!(config.rate_limit.time_period, Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.user_agent.as_deref(), Some("apiq-tests/1.0"));
    }

    #[test]
    fn test_load_from_env_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_apiq_env();
        std::env::set_var("APIQ_BASE_URL", "http://localhost:8080");

        let result = load_from_env();
        clear_apiq_env();

        assert_eq!(result, Ok(ClientConfig::new("http://localhost:8080")));
    }

    #[test]
    fn test_load_from_env_missing_base_url() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_apiq_env();

        let err = load_from_env().expect_err("missing base url");
        assert!(matches!(err, ApiqError::Config(msg) if msg.contains("APIQ_BASE_URL")));
    }

    #[test]
    fn test_load_from_env_rejects_negative_and_zero() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_apiq_env();
        std::env::set_var("APIQ_BASE_URL", "https://api.example.com");

        std::env::set_var("APIQ_RETRIES", "-1");
        let negative = load_from_env();
        std::env::remove_var("APIQ_RETRIES");

        std::env::set_var("APIQ_RPS", "0");
        let zero = load_from_env();
        clear_apiq_env();

        assert!(matches!(negative, Err(ApiqError::Config(msg)) if msg.contains("APIQ_RETRIES")));
        assert!(matches!(zero, Err(ApiqError::Config(msg)) if msg.contains("max_calls")));
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_with_extension(
            r#"
base_url = "https://api.example.com"
version = "v1"

[rate_limit]
max_calls = 3
time_period = 1000

[retry]
max_attempts = 2
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from toml");
        assert_eq!(config.rate_limit.max_calls, 3);
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_with_extension(
            r#"{
                "base_url": "https://api.example.com",
                "headers": {"x-api-key": "secret"},
                "retry": {"max_attempts": 1, "backoff": {"kind": "fixed", "delay": 250}}
            }"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from json");
        assert_eq!(config.headers.get("x-api-key").map(String::as_str), Some("secret"));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.backoff.calculate_delay(0), Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_file_rejects_zero_period() {
        let path = write_with_extension(
            r#"{"base_url": "https://api.example.com", "rate_limit": {"max_calls": 1, "time_period": 0}}"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(ApiqError::Config(msg)) if msg.contains("time_period")));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/apiq.json")));
        assert!(matches!(result, Err(ApiqError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("base_url: x", Path::new("apiq.yaml"));
        assert!(matches!(result, Err(ApiqError::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let result = parse_config(r#"{ "base_url": "#, Path::new("apiq.json"));
        assert!(matches!(result, Err(ApiqError::Config(msg)) if msg.contains("JSON")));
    }
}
