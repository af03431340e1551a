//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Realtime URL must start with ws:// or wss://")]
    InvalidRealtimeUrl,

    #[error("API base URL must start with http:// or https://")]
    InvalidApiUrl,

    #[error("Realtime URL must use wss:// in production")]
    RealtimeUrlMustBeSecure,

    #[error("API base URL must use https:// in production")]
    ApiUrlMustBeHttps,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Reconnect delays must be positive and max must not be below initial")]
    InvalidReconnectDelay,

    #[error("Reconnect multiplier must be a finite number >= 1.0")]
    InvalidReconnectMultiplier,

    #[error("Tick interval must be positive")]
    InvalidTickInterval,

    #[error("Endpoint path must start with '/': {0}")]
    InvalidPath(&'static str),
}
