//! Market order execution.
//!
//! `market_buy` and `market_sell` take the engine lock for their whole body.
//! The fill logic itself lives in lock-free cores that operate on an already
//! locked `EngineState`, so the risk monitor can reuse them inside its own
//! critical section instead of re-entering the lock.

use super::core::{EngineState, LiveTradingEngine};
use super::results::ExecutionError;
use crate::order::ExecutedOrder;
use crate::position::{calculate_realized_pnl, Position};
use crate::price_feed::PriceQuote;
use crate::types::{Amount, Price, Side, Timestamp};
use log::{info, warn};

impl LiveTradingEngine {
    /// Buy `quantity` units at the current ask, all or nothing.
    ///
    /// Optional `stop_loss` / `take_profit` prices register exits covering the
    /// bought quantity. When one is requested the engine starts watching the
    /// symbol's ticks before the fill, even if the buy is then refused.
    pub async fn market_buy(
        &self,
        symbol: &str,
        quantity: u64,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<ExecutedOrder, ExecutionError> {
        if quantity == 0 {
            return Err(ExecutionError::InvalidQuantity(quantity));
        }

        // subscribe first so no tick after the fill goes unchecked
        if stop_loss.is_some() || take_profit.is_some() {
            self.watch_symbol(symbol).await;
        }

        let mut state = self.state.lock().await;
        let quote = self.price_stream.get_current_price(symbol).await;
        self.execute_buy(&mut state, symbol, quantity, quote.as_ref(), stop_loss, take_profit)
    }

    /// Sell `quantity` units of an open position at the current bid.
    pub async fn market_sell(&self, symbol: &str, quantity: u64) -> Result<ExecutedOrder, ExecutionError> {
        if quantity == 0 {
            return Err(ExecutionError::InvalidQuantity(quantity));
        }

        let mut state = self.state.lock().await;
        let quote = self.price_stream.get_current_price(symbol).await;
        self.execute_sell(&mut state, symbol, quantity, quote.as_ref())
    }

    fn commission_on(&self, order_value: Amount) -> Option<Amount> {
        order_value.checked_mul(self.config.commission_rate)
    }

    // 5.3: buy core. every check runs before the first mutation
    pub(super) fn execute_buy(
        &self,
        state: &mut EngineState,
        symbol: &str,
        quantity: u64,
        quote: Option<&PriceQuote>,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<ExecutedOrder, ExecutionError> {
        let quote = quote.ok_or_else(|| {
            warn!("No live price available for {}", symbol);
            ExecutionError::PriceUnavailable(symbol.to_string())
        })?;

        let execution_price = quote.ask_price;
        let too_large = || {
            warn!("Buy of {} {} overflows the books", quantity, symbol);
            ExecutionError::OrderTooLarge {
                symbol: symbol.to_string(),
                quantity,
            }
        };
        let order_value = execution_price.checked_notional(quantity).ok_or_else(too_large)?;
        let commission = self.commission_on(order_value).ok_or_else(too_large)?;
        let total_cost = order_value.checked_add(commission).ok_or_else(too_large)?;

        if total_cost > state.wallet_balance {
            warn!(
                "Insufficient funds for {} {}: required {}, available {}",
                quantity, symbol, total_cost, state.wallet_balance
            );
            return Err(ExecutionError::InsufficientFunds {
                required: total_cost,
                available: state.wallet_balance,
            });
        }

        if let Some(position) = state.positions.get(symbol) {
            position.after_buy(quantity, execution_price).ok_or_else(too_large)?;
        }

        let order = ExecutedOrder::new(
            state.next_order_id(),
            symbol.to_string(),
            Side::Buy,
            quantity,
            execution_price,
            commission,
            Timestamp::now(),
        );

        state.wallet_balance = state.wallet_balance.sub(total_cost);
        match state.positions.get_mut(symbol) {
            Some(position) => {
                let applied = position.apply_buy(&order);
                debug_assert!(applied, "buy passed the overflow check");
            }
            None => {
                state.positions.insert(symbol.to_string(), Position::open(&order));
            }
        }
        state.order_history.push(order.clone());

        if let Some(trigger) = stop_loss {
            let id = state.risk_orders.add_stop_loss(symbol, trigger, quantity, order.executed_at);
            info!("Stop-loss {} set for {} at {}", id, symbol, trigger);
        }
        if let Some(trigger) = take_profit {
            let id = state.risk_orders.add_take_profit(symbol, trigger, quantity, order.executed_at);
            info!("Take-profit {} set for {} at {}", id, symbol, trigger);
        }

        info!(
            "BUY EXECUTED: {} {} @ {} | Cost: {} | Commission: {} | Wallet: {}",
            quantity, symbol, execution_price, total_cost, commission, state.wallet_balance
        );

        Ok(order)
    }

    // 5.4: sell core. cost basis untouched, position dropped at zero
    pub(super) fn execute_sell(
        &self,
        state: &mut EngineState,
        symbol: &str,
        quantity: u64,
        quote: Option<&PriceQuote>,
    ) -> Result<ExecutedOrder, ExecutionError> {
        let quote = quote.ok_or_else(|| {
            warn!("No live price available for {}", symbol);
            ExecutionError::PriceUnavailable(symbol.to_string())
        })?;
        let execution_price = quote.bid_price;

        let position = state.positions.get(symbol).ok_or_else(|| {
            warn!("No position in {} to sell", symbol);
            ExecutionError::NoPosition(symbol.to_string())
        })?;

        if position.quantity < quantity {
            warn!(
                "Insufficient quantity in {}: have {}, want to sell {}",
                symbol, position.quantity, quantity
            );
            return Err(ExecutionError::InsufficientQuantity {
                held: position.quantity,
                requested: quantity,
            });
        }

        let too_large = || {
            warn!("Sell of {} {} overflows the books", quantity, symbol);
            ExecutionError::OrderTooLarge {
                symbol: symbol.to_string(),
                quantity,
            }
        };
        let order_value = execution_price.checked_notional(quantity).ok_or_else(too_large)?;
        let commission = self.commission_on(order_value).ok_or_else(too_large)?;
        let proceeds = order_value.sub(commission);
        let new_balance = state.wallet_balance.checked_add(proceeds).ok_or_else(too_large)?;
        let realized = calculate_realized_pnl(quantity, position.avg_buy_price, execution_price, commission);
        let realized_percent = realized.percent_of(position.avg_buy_price.notional(quantity));

        let order = ExecutedOrder::new(
            state.next_order_id(),
            symbol.to_string(),
            Side::Sell,
            quantity,
            execution_price,
            commission,
            Timestamp::now(),
        );

        state.wallet_balance = new_balance;
        state.order_history.push(order.clone());

        let closed = match state.positions.get_mut(symbol) {
            Some(position) => {
                position.apply_sell(&order);
                position.is_empty()
            }
            None => false,
        };
        if closed {
            state.positions.remove(symbol);
            info!("Position in {} closed", symbol);
        }

        info!(
            "SELL EXECUTED: {} {} @ {} | Proceeds: {} | P&L: {} ({:.2}%)",
            quantity, symbol, execution_price, proceeds, realized, realized_percent
        );

        Ok(order)
    }
}
