//! Engine configuration options.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// What the risk monitor does with a triggered exit whose sell fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFailurePolicy {
    /// Leave the order active; it is re-evaluated on the next tick.
    #[default]
    RetryNextTick,
    /// Remove the order and log a warning.
    Deactivate,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fraction of notional charged on every fill, both sides.
    pub commission_rate: Decimal,
    pub risk_failure_policy: RiskFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.0005),
            risk_failure_policy: RiskFailurePolicy::RetryNextTick,
        }
    }
}
