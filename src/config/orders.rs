//! Pending-order projection configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::orders::OrderProjectionConfig;

/// Pending-order projection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    /// Countdown refresh and expiry sweep period
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl OrdersConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn projection(&self) -> OrderProjectionConfig {
        OrderProjectionConfig::default().with_tick_interval(self.tick_interval())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tick_interval_ms == 0 {
            return Err(ValidationError::InvalidTickInterval);
        }
        Ok(())
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

fn default_tick_interval() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_config_defaults() {
        let config = OrdersConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.projection().tick_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_tick() {
        let config = OrdersConfig { tick_interval_ms: 0 };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTickInterval));
    }
}
