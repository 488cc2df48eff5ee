// 5.6: portfolio reporting. read-only, derived from one consistent state copy.
// realized pnl is recomputed from order history on every call, each sell paired
// against the vwap of every buy of its symbol.

use super::core::LiveTradingEngine;
use crate::order::ExecutedOrder;
use crate::types::{Amount, Price, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Mark-to-market detail for one open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPnl {
    pub quantity: u64,
    pub avg_buy_price: Price,
    pub current_price: Price,
    pub market_value: Amount,
    pub unrealized_pnl: Amount,
    pub unrealized_pnl_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub wallet_balance: Amount,
    pub initial_balance: Amount,
    pub total_realized_pnl: Amount,
    pub total_unrealized_pnl: Amount,
    pub total_pnl: Amount,
    pub total_pnl_percent: Decimal,
    /// Only positions with a cached quote appear here.
    pub positions: BTreeMap<Symbol, PositionPnl>,
    pub active_positions_count: usize,
    pub order_count: usize,
    /// Wallet plus market value of every quoted position.
    pub portfolio_value: Amount,
}

impl LiveTradingEngine {
    pub async fn get_portfolio_pnl(&self) -> PortfolioSnapshot {
        let state = self.snapshot_state().await;

        let total_realized_pnl = realized_pnl(state.order_history());

        let mut positions = BTreeMap::new();
        for (symbol, position) in state.positions() {
            // no quote, no mark. the position still counts in active_positions_count
            let Some(quote) = self.price_stream.get_current_price(symbol).await else {
                continue;
            };
            let current_price = quote.last_price;
            positions.insert(
                symbol.clone(),
                PositionPnl {
                    quantity: position.quantity,
                    avg_buy_price: position.avg_buy_price,
                    current_price,
                    market_value: position.market_value(current_price),
                    unrealized_pnl: position.unrealized_pnl(current_price),
                    unrealized_pnl_percent: position.unrealized_pnl_percent(current_price),
                },
            );
        }

        let total_unrealized_pnl: Amount = positions.values().map(|p| p.unrealized_pnl).sum();
        let market_value: Amount = positions.values().map(|p| p.market_value).sum();
        let total_pnl = total_realized_pnl.add(total_unrealized_pnl);

        PortfolioSnapshot {
            wallet_balance: state.wallet_balance(),
            initial_balance: self.initial_balance,
            total_realized_pnl,
            total_unrealized_pnl,
            total_pnl,
            total_pnl_percent: total_pnl.percent_of(self.initial_balance),
            positions,
            active_positions_count: state.positions().len(),
            order_count: state.order_history().len(),
            portfolio_value: state.wallet_balance().add(market_value),
        }
    }
}

/// Sum over every sell of `(sell_price - vwap_of_all_buys) * qty - commission`.
pub fn realized_pnl(history: &[ExecutedOrder]) -> Amount {
    let mut buys: HashMap<&str, (Decimal, Decimal)> = HashMap::new();
    for order in history.iter().filter(|o| o.is_buy()) {
        let entry = buys.entry(order.symbol.as_str()).or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 = entry.0.saturating_add(order.order_value().value());
        entry.1 = entry.1.saturating_add(Decimal::from(order.quantity));
    }

    history
        .iter()
        .filter(|o| o.is_sell())
        .filter_map(|sell| {
            let (notional, quantity) = *buys.get(sell.symbol.as_str())?;
            if quantity.is_zero() {
                return None;
            }
            let vwap = notional / quantity;
            let pnl = (sell.executed_price.value() - vwap).saturating_mul(Decimal::from(sell.quantity));
            Some(Amount::new(pnl).sub(sell.commission))
        })
        .sum()
}
