//! Application Configuration Module
//!
//! Centralizes the settings for the session core. Values are loaded
//! from environment variables (with `.env` support for local
//! development) or assembled programmatically through the builder.

use std::env;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Level;

/// Default websocket endpoint of the interview service.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000/ws";
/// Ceiling for a single connection attempt. There is no retry.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Idle time on one question before an automatic hint is requested.
pub const DEFAULT_HINT_INTERVAL_SECS: u64 = 60;
/// Code language reported with submissions and hint requests.
pub const DEFAULT_LANGUAGE: &str = "python";
/// Directory where finalized session results are written.
pub const DEFAULT_RESULTS_DIR: &str = "interview_results";

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Keywords that mark a prompt as a coding question. A prompt matching
/// none of them falls back to the free-form (voice) flow.
pub const DEFAULT_CODING_KEYWORDS: &[&str] = &[
    "write a function",
    "write a program",
    "write code",
    "implement",
    "algorithm",
    "in place",
    "time complexity",
    "space complexity",
    "data structure",
    "return the",
    "given an array",
    "given a string",
    "given a list",
    "linked list",
    "binary tree",
    "debug",
];

/// Holds all configuration for one client instance.
#[derive(Debug, Clone)]
pub struct Config {
    server_url: String,
    auth_token: Option<SecretString>,
    connect_timeout: Duration,
    hint_interval: Duration,
    language: String,
    coding_keywords: Vec<String>,
    results_dir: String,
    tts_command: Option<String>,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            auth_token: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            hint_interval: Duration::from_secs(DEFAULT_HINT_INTERVAL_SECS),
            language: DEFAULT_LANGUAGE.to_string(),
            coding_keywords: DEFAULT_CODING_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
            tts_command: None,
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `CODESAGE_SERVER_URL`: websocket endpoint of the interview service.
    // *   `CODESAGE_AUTH_TOKEN`: (Optional) bearer token sent on connect.
    // *   `CODESAGE_CONNECT_TIMEOUT_SECS`: (Optional) connect ceiling in seconds.
    // *   `CODESAGE_HINT_INTERVAL_SECS`: (Optional) auto-hint idle interval in seconds.
    // *   `CODESAGE_LANGUAGE`: (Optional) code language label. Defaults to "python".
    // *   `CODESAGE_RESULTS_DIR`: (Optional) where result JSON files land.
    // *   `CODESAGE_TTS_COMMAND`: (Optional) external program used to speak text.
    // *   `RUST_LOG`: (Optional) the logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignored if no .env file is present.
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Ok(url) = env::var("CODESAGE_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(token) = env::var("CODESAGE_AUTH_TOKEN") {
            config.auth_token = Some(SecretString::from(token));
        }
        if let Ok(raw) = env::var("CODESAGE_CONNECT_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidVar("CODESAGE_CONNECT_TIMEOUT_SECS", raw))?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = env::var("CODESAGE_HINT_INTERVAL_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidVar("CODESAGE_HINT_INTERVAL_SECS", raw))?;
            config.hint_interval = Duration::from_secs(secs);
        }
        if let Ok(language) = env::var("CODESAGE_LANGUAGE") {
            config.language = language;
        }
        if let Ok(dir) = env::var("CODESAGE_RESULTS_DIR") {
            config.results_dir = dir;
        }
        if let Ok(cmd) = env::var("CODESAGE_TTS_COMMAND") {
            config.tts_command = Some(cmd);
        }

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        config.log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn auth_token(&self) -> Option<&SecretString> {
        self.auth_token.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn hint_interval(&self) -> Duration {
        self.hint_interval
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn coding_keywords(&self) -> &[String] {
        &self.coding_keywords
    }

    pub fn results_dir(&self) -> &str {
        &self.results_dir
    }

    pub fn tts_command(&self) -> Option<&str> {
        self.tts_command.as_deref()
    }

    // Command-line overrides, applied on top of the environment.

    pub fn set_server_url(&mut self, url: String) {
        self.server_url = url;
    }

    pub fn set_language(&mut self, language: String) {
        self.language = language;
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_server_url(mut self, url: &str) -> Self {
        self.config.server_url = url.to_string();
        self
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.config.auth_token = Some(SecretString::from(token.to_string()));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_hint_interval(mut self, interval: Duration) -> Self {
        self.config.hint_interval = interval;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.config.language = language.to_string();
        self
    }

    pub fn with_coding_keywords(mut self, keywords: Vec<String>) -> Self {
        self.config.coding_keywords = keywords;
        self
    }

    pub fn with_results_dir(mut self, dir: &str) -> Self {
        self.config.results_dir = dir.to_string();
        self
    }

    pub fn with_tts_command(mut self, command: &str) -> Self {
        self.config.tts_command = Some(command.to_string());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.hint_interval(), Duration::from_secs(60));
        assert_eq!(config.language(), "python");
        assert!(config.auth_token().is_none());
        assert!(!config.coding_keywords().is_empty());
    }

    #[test]
    fn builder_overrides_stick() {
        let config = Config::builder()
            .with_server_url("ws://interviews.example.com/ws")
            .with_hint_interval(Duration::from_secs(30))
            .with_language("rust")
            .with_coding_keywords(vec!["borrow checker".to_string()])
            .with_results_dir("/tmp/results")
            .with_tts_command("espeak")
            .build();

        assert_eq!(config.server_url(), "ws://interviews.example.com/ws");
        assert_eq!(config.hint_interval(), Duration::from_secs(30));
        assert_eq!(config.language(), "rust");
        assert_eq!(config.coding_keywords(), ["borrow checker".to_string()]);
        assert_eq!(config.results_dir(), "/tmp/results");
        assert_eq!(config.tts_command(), Some("espeak"));
    }
}
