// 4.0: open holding per symbol. pnl = quantity * (price - avg_buy_price).
// 4.1 buy/sell application at the bottom. only buys move the cost basis.

use crate::order::ExecutedOrder;
use crate::types::{Amount, Price, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: u64,
    pub avg_buy_price: Price,
    pub buy_orders: Vec<ExecutedOrder>,
    pub sell_orders: Vec<ExecutedOrder>,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn open(fill: &ExecutedOrder) -> Self {
        Self {
            symbol: fill.symbol.clone(),
            quantity: fill.quantity,
            avg_buy_price: fill.executed_price,
            buy_orders: vec![fill.clone()],
            sell_orders: Vec::new(),
            opened_at: fill.executed_at,
            updated_at: fill.executed_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Capital still tied up at cost: quantity * avg_buy_price.
    pub fn total_cost(&self) -> Amount {
        self.avg_buy_price.notional(self.quantity)
    }

    pub fn market_value(&self, price: Price) -> Amount {
        price.notional(self.quantity)
    }

    // 4.1: paper gains/losses at the given price
    pub fn unrealized_pnl(&self, price: Price) -> Amount {
        calculate_unrealized_pnl(self.quantity, self.avg_buy_price, price)
    }

    pub fn unrealized_pnl_percent(&self, price: Price) -> Decimal {
        self.unrealized_pnl(price).percent_of(self.total_cost())
    }

    /// Quantity and cost basis after buying `quantity` more at `price`,
    /// or `None` when either no longer fits.
    pub fn after_buy(&self, quantity: u64, price: Price) -> Option<(u64, Price)> {
        let total = self.quantity.checked_add(quantity)?;
        let avg = weighted_average_price(self.quantity, self.avg_buy_price, quantity, price)?;
        Some((total, avg))
    }

    // 4.2: adds a buy fill and re-averages the cost basis.
    // on overflow nothing changes and false comes back.
    pub fn apply_buy(&mut self, fill: &ExecutedOrder) -> bool {
        debug_assert!(fill.is_buy());
        let Some((quantity, avg)) = self.after_buy(fill.quantity, fill.executed_price) else {
            return false;
        };
        self.quantity = quantity;
        self.avg_buy_price = avg;
        self.buy_orders.push(fill.clone());
        self.updated_at = fill.executed_at;
        true
    }

    // 4.3: reduces quantity. cost basis untouched. caller drops the position at zero.
    pub fn apply_sell(&mut self, fill: &ExecutedOrder) {
        debug_assert!(fill.is_sell());
        debug_assert!(fill.quantity <= self.quantity, "sell larger than holding");
        self.quantity -= fill.quantity;
        self.sell_orders.push(fill.clone());
        self.updated_at = fill.executed_at;
    }
}

// 4.4: the pnl formula. quantity * (price - avg)
pub fn calculate_unrealized_pnl(quantity: u64, avg_buy_price: Price, price: Price) -> Amount {
    Amount::new(Decimal::from(quantity).saturating_mul(price.value() - avg_buy_price.value()))
}

/// Realized P&L of a single sell fill against a cost basis, net of the sell commission.
pub fn calculate_realized_pnl(quantity: u64, avg_buy_price: Price, exit_price: Price, commission: Amount) -> Amount {
    exit_price
        .notional(quantity)
        .sub(avg_buy_price.notional(quantity))
        .sub(commission)
}

/// Volume-weighted average of two lots. `None` when the combined quantity or
/// the weighted sum overflows.
pub fn weighted_average_price(held: u64, held_price: Price, added: u64, added_price: Price) -> Option<Price> {
    let total = held.checked_add(added)?;
    if total == 0 {
        return Some(held_price);
    }
    let weighted_sum = held_price
        .checked_notional(held)?
        .checked_add(added_price.checked_notional(added)?)?;
    Some(Price::new_unchecked(weighted_sum.value() / Decimal::from(total)))
}
