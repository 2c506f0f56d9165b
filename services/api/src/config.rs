use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use tutor_core::{challenge::DEFAULT_BASE_URL, retry::RetryPolicy};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported OpenAI-compatible LLM providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub challenge_api_base: String,
    pub challenge_api_key: String,
    pub provider: Provider,
    pub llm_api_key: String,
    pub llm_api_base: String,
    pub chat_model: String,
    pub log_level: Level,
    pub log_dir: PathBuf,
    pub prompts_path: PathBuf,
    pub max_turns: u32,
    pub upstream_timeout: Duration,
    pub retry: RetryPolicy,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

/// Reads `name`, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let challenge_api_key = required_var("KNOWUNITY_API_KEY")?;
        let challenge_api_base =
            std::env::var("KNOWUNITY_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of openai, gemini", other),
                ));
            }
        };

        let llm_api_key = match provider {
            Provider::OpenAI => required_var("OPENAI_API_KEY").map_err(|_| {
                ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                )
            })?,
            Provider::Gemini => required_var("GEMINI_API_KEY").map_err(|_| {
                ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                )
            })?,
        };
        let llm_api_base = std::env::var("LLM_API_BASE")
            .unwrap_or_else(|_| provider.default_api_base().to_string());

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let log_dir = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));
        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let max_turns: u32 = parse_var("MAX_CONVERSATION_TURNS", 10)?;
        if max_turns == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_CONVERSATION_TURNS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let upstream_timeout = Duration::from_secs(parse_var("UPSTREAM_TIMEOUT_SECS", 30)?);

        let max_attempts: u32 = parse_var("RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "RETRY_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry = RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(parse_var("RETRY_INITIAL_BACKOFF_MS", 250)?),
            max_backoff: Duration::from_millis(parse_var("RETRY_MAX_BACKOFF_MS", 2_000)?),
        };

        let session_ttl = Duration::from_secs(parse_var("SESSION_TTL_SECS", 3_600)?);
        let sweep_secs: u64 = parse_var("SESSION_SWEEP_INTERVAL_SECS", 60)?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_SWEEP_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            challenge_api_base,
            challenge_api_key,
            provider,
            llm_api_key,
            llm_api_base,
            chat_model,
            log_level,
            log_dir,
            prompts_path,
            max_turns,
            upstream_timeout,
            retry,
            session_ttl,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const ALL_VARS: &[&str] = &[
        "BIND_ADDRESS",
        "KNOWUNITY_API_KEY",
        "KNOWUNITY_API_BASE",
        "LLM_PROVIDER",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "LLM_API_BASE",
        "CHAT_MODEL",
        "RUST_LOG",
        "LOG_DIR",
        "PROMPTS_PATH",
        "MAX_CONVERSATION_TURNS",
        "UPSTREAM_TIMEOUT_SECS",
        "RETRY_MAX_ATTEMPTS",
        "RETRY_INITIAL_BACKOFF_MS",
        "RETRY_MAX_BACKOFF_MS",
        "SESSION_TTL_SECS",
        "SESSION_SWEEP_INTERVAL_SECS",
    ];

    fn clear_env_vars() {
        unsafe {
            for var in ALL_VARS {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("KNOWUNITY_API_KEY", "test-challenge-key");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.challenge_api_key, "test-challenge-key");
        assert_eq!(config.challenge_api_base, DEFAULT_BASE_URL);
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.llm_api_key, "test-openai-key");
        assert_eq!(config.llm_api_base, "https://api.openai.com/v1");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.session_ttl, Duration::from_secs(3_600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("KNOWUNITY_API_KEY", "k");
            env::set_var("KNOWUNITY_API_BASE", "http://localhost:9000");
            env::set_var("LLM_PROVIDER", "Gemini");
            env::set_var("GEMINI_API_KEY", "custom-gemini-key");
            env::set_var("CHAT_MODEL", "gemini-2.0-flash");
            env::set_var("RUST_LOG", "debug");
            env::set_var("LOG_DIR", "/var/log/tutor");
            env::set_var("MAX_CONVERSATION_TURNS", "4");
            env::set_var("RETRY_MAX_ATTEMPTS", "5");
            env::set_var("RETRY_INITIAL_BACKOFF_MS", "10");
            env::set_var("RETRY_MAX_BACKOFF_MS", "80");
            env::set_var("SESSION_TTL_SECS", "120");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.challenge_api_base, "http://localhost:9000");
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.llm_api_key, "custom-gemini-key");
        assert_eq!(
            config.llm_api_base,
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(config.chat_model, "gemini-2.0-flash");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/tutor"));
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(10));
        assert_eq!(config.retry.max_backoff, Duration::from_millis(80));
        assert_eq!(config.session_ttl, Duration::from_secs(120));
    }

    #[test]
    #[serial]
    fn test_config_missing_challenge_key() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "KNOWUNITY_API_KEY"),
            _ => panic!("Expected MissingVar for KNOWUNITY_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_provider_key() {
        clear_env_vars();
        unsafe {
            env::set_var("KNOWUNITY_API_KEY", "k");
            env::set_var("LLM_PROVIDER", "gemini");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_unknown_provider() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("LLM_PROVIDER", "llama");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LLM_PROVIDER"),
            _ => panic!("Expected InvalidValue for LLM_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_max_turns() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("MAX_CONVERSATION_TURNS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "MAX_CONVERSATION_TURNS"),
            _ => panic!("Expected InvalidValue for MAX_CONVERSATION_TURNS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_non_numeric_ttl() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("SESSION_TTL_SECS", "an hour");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "SESSION_TTL_SECS"),
            _ => panic!("Expected InvalidValue for SESSION_TTL_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
