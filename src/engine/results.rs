// 5.0.2: result types and errors for engine operations.

use crate::conditional::{RiskOrder, RiskOrderKind};
use crate::order::ExecutedOrder;
use crate::types::{Amount, Symbol};

/// Every way a market buy or sell can be refused. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(u64),

    #[error("No live price available for {0}")]
    PriceUnavailable(Symbol),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("No position in {0}")]
    NoPosition(Symbol),

    #[error("Insufficient quantity: have {held}, want to sell {requested}")]
    InsufficientQuantity { held: u64, requested: u64 },

    #[error("Order of {quantity} {symbol} is too large to book")]
    OrderTooLarge { symbol: Symbol, quantity: u64 },
}

/// One risk order that fired on a tick, and what came of its sell.
#[derive(Debug, Clone)]
pub struct TriggeredExit {
    pub risk_order: RiskOrder,
    pub result: Result<ExecutedOrder, ExecutionError>,
    /// Whether the order is still in the book after this tick.
    pub still_active: bool,
}

impl TriggeredExit {
    pub fn kind(&self) -> RiskOrderKind {
        self.risk_order.kind
    }

    pub fn executed(&self) -> Option<&ExecutedOrder> {
        self.result.as_ref().ok()
    }
}
