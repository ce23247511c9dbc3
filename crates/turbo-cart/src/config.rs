//! Cart engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Currency;

/// Maximum quantity allowed per line item unless configured otherwise.
pub const DEFAULT_MAX_QUANTITY_PER_ITEM: i64 = 9999;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What the store does with its optimistic change when the remote rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the local change and only report the failure.
    #[default]
    Keep,
    /// Put the line back the way it was before the change, unless a newer
    /// change has touched it since.
    Revert,
}

/// Retry settings for remote confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first. Zero disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub backoff_ms: u64,
    /// Double the delay after each retry.
    pub exponential: bool,
    /// Upper bound on a single delay.
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.backoff_ms);
        if !self.exponential {
            return base;
        }
        let multiplier = 2u64.saturating_pow(attempt);
        let delay = Duration::from_millis(self.backoff_ms.saturating_mul(multiplier));
        delay.min(Duration::from_millis(self.max_backoff_ms.max(self.backoff_ms)))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff_ms: 100,
            exponential: false,
            max_backoff_ms: 1_000,
        }
    }
}

/// Cart engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Currency every cart amount is held in.
    pub currency: Currency,

    /// Upper bound on a single remote confirmation.
    pub confirm_timeout_ms: u64,

    /// Handling of rejected confirmations.
    pub failure_policy: FailurePolicy,

    /// Largest quantity a single line may hold.
    pub max_quantity_per_item: i64,

    /// Viewports at least this wide open the panel after add-to-cart.
    pub open_on_add_min_width: u32,

    /// Route of the full cart page.
    pub cart_route: String,

    /// Emit a success notice when a confirmation lands.
    pub notify_success: bool,

    /// Retry settings for failed confirmations.
    pub retry: RetryConfig,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            confirm_timeout_ms: 5_000,
            failure_policy: FailurePolicy::Keep,
            max_quantity_per_item: DEFAULT_MAX_QUANTITY_PER_ITEM,
            open_on_add_min_width: 992,
            cart_route: "/carts".to_string(),
            notify_success: true,
            retry: RetryConfig::default(),
        }
    }
}

impl CartConfig {
    /// Load config from a TOML or JSON file, picked by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        let config: CartConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: display,
                source,
            })?
        } else {
            Self::from_toml(&content).map_err(|e| match e {
                ConfigError::Toml { source, .. } => ConfigError::Toml {
                    path: display,
                    source,
                },
                other => other,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CartConfig = toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check values a deserializer cannot rule out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirm_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "confirm_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.max_quantity_per_item <= 0 {
            return Err(ConfigError::Invalid(
                "max_quantity_per_item must be greater than zero".into(),
            ));
        }
        if !self.cart_route.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "cart_route must be absolute, got {:?}",
                self.cart_route
            )));
        }
        Ok(())
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CartConfig::default();
        assert_eq!(config.confirm_timeout(), Duration::from_secs(5));
        assert_eq!(config.failure_policy, FailurePolicy::Keep);
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.cart_route, "/carts");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = CartConfig::from_toml(
            r#"
            currency = "EUR"
            failure_policy = "revert"

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.currency, Currency::EUR);
        assert_eq!(config.failure_policy, FailurePolicy::Revert);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_ms, 100);
        assert_eq!(config.max_quantity_per_item, DEFAULT_MAX_QUANTITY_PER_ITEM);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CartConfig::from_toml("confirm_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_relative_route_rejected() {
        let err = CartConfig::from_toml(r#"cart_route = "carts""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = CartConfig::default().to_toml().unwrap();
        assert_eq!(CartConfig::from_toml(&text).unwrap(), CartConfig::default());
    }

    #[test]
    fn test_backoff() {
        let fixed = RetryConfig {
            max_attempts: 3,
            backoff_ms: 50,
            exponential: false,
            max_backoff_ms: 1_000,
        };
        assert_eq!(fixed.delay_for_attempt(2), Duration::from_millis(50));

        let exp = RetryConfig {
            exponential: true,
            max_backoff_ms: 300,
            ..fixed
        };
        assert_eq!(exp.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(exp.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(exp.delay_for_attempt(4), Duration::from_millis(300));
    }
}
