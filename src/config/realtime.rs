//! Realtime socket configuration

use serde::Deserialize;
use std::time::Duration;

use super::client::Environment;
use super::error::ValidationError;
use crate::application::connection::ReconnectPolicy;

/// Realtime socket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Socket endpoint (`ws://` or `wss://`)
    pub url: String,

    /// Delay before the first reconnect attempt
    #[serde(default = "default_initial_delay")]
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound on the reconnect delay
    #[serde(default = "default_max_delay")]
    pub reconnect_max_delay_ms: u64,

    /// Growth factor applied per failed attempt
    #[serde(default = "default_multiplier")]
    pub reconnect_multiplier: f64,
}

impl RealtimeConfig {
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Reconnect schedule described by this section
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_initial_delay(),
            self.reconnect_max_delay(),
            self.reconnect_multiplier,
        )
    }

    /// Validate realtime configuration
    ///
    /// In production, requires `wss://`.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REALTIME__URL"));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ValidationError::InvalidRealtimeUrl);
        }
        if *environment == Environment::Production && !self.url.starts_with("wss://") {
            return Err(ValidationError::RealtimeUrlMustBeSecure);
        }

        if self.reconnect_initial_delay_ms == 0
            || self.reconnect_max_delay_ms < self.reconnect_initial_delay_ms
        {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        if !self.reconnect_multiplier.is_finite() || self.reconnect_multiplier < 1.0 {
            return Err(ValidationError::InvalidReconnectMultiplier);
        }

        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_initial_delay_ms: default_initial_delay(),
            reconnect_max_delay_ms: default_max_delay(),
            reconnect_multiplier: default_multiplier(),
        }
    }
}

fn default_initial_delay() -> u64 {
    3000
}

fn default_max_delay() -> u64 {
    30000
}

fn default_multiplier() -> f64 {
    2.0
}
