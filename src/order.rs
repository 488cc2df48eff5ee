//! Executed order records.
//!
//! Every successful market buy or sell produces exactly one `ExecutedOrder`.
//! Records are append-only history: nothing mutates them after creation.

use crate::types::{Amount, OrderId, Price, Side, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// Order lifecycle state.
///
/// The engine only ever records `Executed` fills. The other states exist so
/// callers mirroring a broker's order book can share the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Executed,
    Failed,
    Cancelled,
}

/// A fill at a specific price and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedOrder {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    /// Ask for buys, bid for sells.
    pub executed_price: Price,
    pub executed_at: Timestamp,
    pub commission: Amount,
    pub status: OrderStatus,
}

impl ExecutedOrder {
    pub fn new(
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        quantity: u64,
        executed_price: Price,
        commission: Amount,
        executed_at: Timestamp,
    ) -> Self {
        debug_assert!(quantity > 0, "fills are never empty");
        Self {
            order_id,
            symbol,
            side,
            quantity,
            executed_price,
            executed_at,
            commission,
            status: OrderStatus::Executed,
        }
    }

    /// quantity * executed_price, before commission
    pub fn order_value(&self) -> Amount {
        self.executed_price.notional(self.quantity)
    }

    /// Cash impact on the wallet: negative for buys, positive for sells.
    pub fn cash_flow(&self) -> Amount {
        match self.side {
            Side::Buy => Amount::zero().sub(self.order_value()).sub(self.commission),
            Side::Sell => self.order_value().sub(self.commission),
        }
    }

    /// Broker-style reference, e.g. `BUY-1`, `SELL-7`.
    pub fn reference(&self) -> String {
        format!("{}-{}", self.side.label(), self.order_id.0)
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.side == Side::Sell
    }
}
