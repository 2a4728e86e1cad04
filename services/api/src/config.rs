//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use learning_module_core::pipeline::PipelineConfig;
use learning_module_core::quiz::QuizConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
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
    /// When unset, modules are kept in memory for the lifetime of the process.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: String,
    pub generation_model: String,
    pub stage_delay: Duration,
    pub quiz_seconds_per_question: u32,
    pub quiz_advance_delay: Duration,
    pub quiz_pass_threshold: u8,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_url: None,
            log_level: Level::INFO,
            openai_api_key: String::new(),
            generation_model: "gpt-4o-mini".to_string(),
            stage_delay: Duration::ZERO,
            quiz_seconds_per_question: 60,
            quiz_advance_delay: Duration::from_millis(1500),
            quiz_pass_threshold: 70,
            cors_origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Reads a variable that has no default. Blank counts as missing.
fn required_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

/// Reads an optional variable and parses it, falling back to `default`.
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

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Config::default();

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Generator Settings ---
        let openai_api_key = required_var("OPENAI_API_KEY")?;
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or(defaults.generation_model);
        let stage_delay = Duration::from_millis(parse_var("GENERATION_STAGE_DELAY_MS", 0u64)?);

        // --- Load Quiz Settings ---
        let quiz_seconds_per_question =
            parse_var("QUIZ_SECONDS_PER_QUESTION", defaults.quiz_seconds_per_question)?;
        if quiz_seconds_per_question == 0 {
            return Err(ConfigError::InvalidValue(
                "QUIZ_SECONDS_PER_QUESTION".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let quiz_advance_delay = Duration::from_millis(parse_var("QUIZ_ADVANCE_DELAY_MS", 1500u64)?);
        let quiz_pass_threshold = parse_var("QUIZ_PASS_THRESHOLD", defaults.quiz_pass_threshold)?;
        if quiz_pass_threshold > 100 {
            return Err(ConfigError::InvalidValue(
                "QUIZ_PASS_THRESHOLD".to_string(),
                format!("{} is not a percentage", quiz_pass_threshold),
            ));
        }

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            generation_model,
            stage_delay,
            quiz_seconds_per_question,
            quiz_advance_delay,
            quiz_pass_threshold,
            cors_origin,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            stage_delay: self.stage_delay,
        }
    }

    pub fn quiz_config(&self) -> QuizConfig {
        QuizConfig {
            seconds_per_question: self.quiz_seconds_per_question,
            advance_delay: self.quiz_advance_delay,
            pass_threshold: self.quiz_pass_threshold,
        }
    }
}
