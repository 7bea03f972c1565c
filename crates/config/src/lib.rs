//! Configuration management for the realtime voice client
//!
//! Supports loading configuration from:
//! - An optional `config/default` file (YAML/TOML/JSON)
//! - Environment variables (`AZURE_OPENAI_` prefix, matching the service's
//!   documented variable names: `AZURE_OPENAI_ENDPOINT`,
//!   `AZURE_OPENAI_DEPLOYMENT`, `AZURE_OPENAI_API_KEY`,
//!   `AZURE_OPENAI_REGION`)
//!
//! Configuration is read once at startup and validated before the client is
//! constructed; missing required settings are fatal.

pub mod settings;

pub use settings::{load_settings, AudioSettings, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
