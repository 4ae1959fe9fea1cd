use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Values given on the command line. Each one wins over its variable.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub ws_url: Option<String>,
    pub fallback_url: Option<String>,
    pub user_name: Option<String>,
    pub language: Option<String>,
}

/// Everything the client needs to start a session.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub ws_url: String,
    pub fallback_url: String,
    pub user_name: String,
    pub language: String,
    pub log_level: Level,
}

fn pick(value: Option<String>, var: &str) -> Option<String> {
    value
        .or_else(|| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_scheme(var: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if schemes.iter().any(|s| value.starts_with(s)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' must start with one of {:?}", value, schemes),
        ))
    }
}

impl ClientConfig {
    /// Loads configuration from the environment, letting `overrides` win.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let ws_url = pick(overrides.ws_url, "CHAT_WS_URL")
            .unwrap_or_else(|| "ws://127.0.0.1:3000/ws".to_string());
        check_scheme("CHAT_WS_URL", &ws_url, &["ws://", "wss://"])?;

        let fallback_url = pick(overrides.fallback_url, "CHAT_FALLBACK_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3000/api/chat".to_string());
        check_scheme("CHAT_FALLBACK_URL", &fallback_url, &["http://", "https://"])?;

        let user_name = pick(overrides.user_name, "CHAT_USER_NAME")
            .ok_or_else(|| ConfigError::MissingVar("CHAT_USER_NAME".to_string()))?;

        let language =
            pick(overrides.language, "CHAT_LANGUAGE").unwrap_or_else(|| "English".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            ws_url,
            fallback_url,
            user_name,
            language,
            log_level,
        })
    }
}
