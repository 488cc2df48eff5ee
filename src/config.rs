// 7.0 config.rs: all settings in one place. wallet, commission, risk policy, feed.
// 7.1 presets per environment, json loading, env-var overlay, validation.

use crate::engine::{EngineConfig, RiskFailurePolicy};
use crate::simulator::{default_instruments, SimulatedInstrument};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const ENV_ENVIRONMENT: &str = "LIVE_TRADING_ENV";
pub const ENV_INITIAL_BALANCE: &str = "LIVE_TRADING_INITIAL_BALANCE";
pub const ENV_COMMISSION_RATE: &str = "LIVE_TRADING_COMMISSION_RATE";
pub const ENV_TICK_INTERVAL_MS: &str = "LIVE_TRADING_TICK_INTERVAL_MS";

// Tick source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    // Name passed to connect_to_market_feed
    pub source: String,
    // Milliseconds between simulated ticks
    pub tick_interval_ms: u64,
    // Half the bid/ask spread quoted by the simulator
    pub half_spread: Decimal,
    // Fixed seed for reproducible runs
    pub seed: Option<u64>,
    pub instruments: Vec<SimulatedInstrument>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: "simulator".to_string(),
            tick_interval_ms: 5_000, // 5s like the broker poll
            half_spread: dec!(0.25),
            seed: None,
            instruments: default_instruments(),
        }
    }
}

/** 7.2: the complete engine configuration */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    pub environment: Environment,
    pub initial_balance: Decimal,
    pub engine: EngineConfig,
    pub feed: FeedConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            initial_balance: dec!(500000),
            engine: EngineConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl TradingConfig {
    // Paper trading: realistic fees, reproducible feed
    pub fn paper() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Paper;
        config.initial_balance = dec!(100000);
        config.feed.seed = Some(42);
        config.feed.tick_interval_ms = 1_000;
        config
    }

    // Production: failed exits are dropped loudly instead of retried forever
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Production;
        config.engine.commission_rate = dec!(0.0003);
        config.engine.risk_failure_policy = RiskFailurePolicy::Deactivate;
        config.feed.source = "broker-websocket".to_string();
        config.feed.instruments = Vec::new();
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `LIVE_TRADING_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    // lookup is injectable so tests never touch the real environment
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ENVIRONMENT) {
            let environment: Environment = value.parse()?;
            let initial_balance = self.initial_balance;
            self = environment.config();
            self.initial_balance = initial_balance;
        }
        if let Some(value) = lookup(ENV_INITIAL_BALANCE) {
            self.initial_balance = parse_decimal(ENV_INITIAL_BALANCE, &value)?;
        }
        if let Some(value) = lookup(ENV_COMMISSION_RATE) {
            self.engine.commission_rate = parse_decimal(ENV_COMMISSION_RATE, &value)?;
        }
        if let Some(value) = lookup(ENV_TICK_INTERVAL_MS) {
            self.feed.tick_interval_ms = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TICK_INTERVAL_MS.to_string(),
                value,
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(ConfigError::InvalidBalance {
                reason: "Initial balance must be positive".to_string(),
            });
        }

        // commission is a fraction of notional. 1 would eat the whole fill
        if self.engine.commission_rate < Decimal::ZERO || self.engine.commission_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidCommission {
                reason: "Commission rate must be in [0, 1)".to_string(),
            });
        }

        if self.feed.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidFeed {
                reason: "Tick interval must be positive".to_string(),
            });
        }

        if self.feed.half_spread < Decimal::ZERO {
            return Err(ConfigError::InvalidFeed {
                reason: "Half spread cannot be negative".to_string(),
            });
        }

        for instrument in &self.feed.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(ConfigError::InvalidFeed {
                    reason: "Instrument symbol is empty".to_string(),
                });
            }
            // lowest bid must stay positive
            if instrument.range < Decimal::ZERO
                || instrument.base_price - instrument.range - self.feed.half_spread <= Decimal::ZERO
            {
                return Err(ConfigError::InvalidFeed {
                    reason: format!("{} price range reaches zero", instrument.symbol),
                });
            }
        }

        Ok(())
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid balance: {reason}")]
    InvalidBalance { reason: String },

    #[error("Invalid commission: {reason}")]
    InvalidCommission { reason: String },

    #[error("Invalid feed: {reason}")]
    InvalidFeed { reason: String },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown environment {0:?}")]
    UnknownEnvironment(String),

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Paper,
    Production,
}

impl Environment {
    pub fn config(&self) -> TradingConfig {
        match self {
            Environment::Development => TradingConfig::default(),
            Environment::Paper => TradingConfig::paper(),
            Environment::Production => TradingConfig::production(),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "paper" => Ok(Environment::Paper),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_valid() {
        let config = TradingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.commission_rate, dec!(0.0005));
        assert_eq!(config.initial_balance, dec!(500000));
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Paper.config().validate().is_ok());
        assert!(Environment::Production.config().validate().is_ok());
        assert_eq!(
            Environment::Production.config().engine.risk_failure_policy,
            RiskFailurePolicy::Deactivate
        );
    }

    #[test]
    fn test_invalid_commission() {
        let mut config = TradingConfig::default();
        config.engine.commission_rate = Decimal::ONE;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCommission { .. })));
    }

    #[test]
    fn test_instrument_range_too_wide() {
        let mut config = TradingConfig::default();
        config.feed.instruments = vec![SimulatedInstrument::new("X", dec!(5), dec!(5))];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFeed { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let config = TradingConfig::default()
            .with_overrides(lookup(&[
                (ENV_ENVIRONMENT, "paper"),
                (ENV_INITIAL_BALANCE, "250000.50"),
                (ENV_TICK_INTERVAL_MS, "250"),
            ]))
            .unwrap();

        assert_eq!(config.environment, Environment::Paper);
        assert_eq!(config.initial_balance, dec!(250000.50));
        assert_eq!(config.feed.tick_interval_ms, 250);
        assert_eq!(config.feed.seed, Some(42));
    }

    #[test]
    fn test_env_overrides_reject_garbage() {
        let bad_rate = TradingConfig::default().with_overrides(lookup(&[(ENV_COMMISSION_RATE, "lots")]));
        assert!(matches!(bad_rate, Err(ConfigError::InvalidValue { .. })));

        let bad_env = TradingConfig::default().with_overrides(lookup(&[(ENV_ENVIRONMENT, "staging")]));
        assert_eq!(bad_env, Err(ConfigError::UnknownEnvironment("staging".to_string())));

        let negative = TradingConfig::default().with_overrides(lookup(&[(ENV_INITIAL_BALANCE, "-1")]));
        assert!(matches!(negative, Err(ConfigError::InvalidBalance { .. })));
    }

    #[test]
    fn test_config_serialization() {
        let config = TradingConfig::paper();
        let json = serde_json::to_string(&config).unwrap();
        let back = TradingConfig::from_json(&json).unwrap();
        assert_eq!(back, config);

        assert!(matches!(TradingConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
