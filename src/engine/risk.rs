// 5.5: risk-order monitor. evaluated once per tick for the tick's symbol, never polled,
// always against the symbol's latest quote.
// runs from the notification path, which holds no engine lock. evaluation and the
// resulting sells share one critical section, so an order cannot fire twice.

use super::config::RiskFailurePolicy;
use super::core::{EngineState, LiveTradingEngine};
use super::results::TriggeredExit;
use crate::conditional::{RiskOrderKind, RiskOrdersSnapshot};
use crate::price_feed::{PriceQuote, Subscription};
use crate::types::{Price, RiskOrderId, Symbol};
use log::{info, warn};

impl LiveTradingEngine {
    /// Fire every active risk order on `symbol` that `current_price` crosses.
    ///
    /// Stop-losses go first, then take-profits, each in registration order.
    /// A fired order is removed once its sell succeeds. A failed sell is
    /// handled by the configured `RiskFailurePolicy`.
    pub async fn check_risk_orders(&self, symbol: &str, current_price: Price) -> Vec<TriggeredExit> {
        let mut state = self.state.lock().await;
        let quote = self.price_stream.get_current_price(symbol).await;
        self.fire_triggers(&mut state, symbol, current_price, quote.as_ref())
    }

    /// Evaluate `symbol`'s risk orders against the latest cached quote.
    ///
    /// This is what the tick subscription runs. Ticks published back to back
    /// may be handled after newer ones, so the tick's own price is never used:
    /// a superseded crash cannot fire a stop-loss once the market has recovered.
    pub async fn check_risk_orders_at_market(&self, symbol: &str) -> Vec<TriggeredExit> {
        let mut state = self.state.lock().await;
        match self.price_stream.get_current_price(symbol).await {
            Some(quote) => self.fire_triggers(&mut state, symbol, quote.last_price, Some(&quote)),
            None => Vec::new(),
        }
    }

    // 5.5.1: evaluation and exits, inside the caller's critical section
    fn fire_triggers(
        &self,
        state: &mut EngineState,
        symbol: &str,
        current_price: Price,
        quote: Option<&PriceQuote>,
    ) -> Vec<TriggeredExit> {
        let triggered = state.risk_orders.check_triggers(symbol, current_price);
        if triggered.is_empty() {
            return Vec::new();
        }

        let mut exits = Vec::with_capacity(triggered.len());

        for risk_order in triggered {
            match risk_order.kind {
                RiskOrderKind::StopLoss => warn!(
                    "STOP-LOSS {} triggered for {} at {} (trigger {})",
                    risk_order.id, symbol, current_price, risk_order.trigger_price
                ),
                RiskOrderKind::TakeProfit => info!(
                    "TAKE-PROFIT {} triggered for {} at {} (trigger {})",
                    risk_order.id, symbol, current_price, risk_order.trigger_price
                ),
            }

            let result = self.execute_sell(state, symbol, risk_order.quantity, quote);
            let still_active = match (&result, self.config.risk_failure_policy) {
                (Ok(_), _) => {
                    state.risk_orders.remove(risk_order.id);
                    false
                }
                (Err(e), RiskFailurePolicy::RetryNextTick) => {
                    warn!("Auto-sell for {} failed, retrying next tick: {}", risk_order.id, e);
                    true
                }
                (Err(e), RiskFailurePolicy::Deactivate) => {
                    warn!("Auto-sell for {} failed, deactivating: {}", risk_order.id, e);
                    state.risk_orders.remove(risk_order.id);
                    false
                }
            };

            exits.push(TriggeredExit {
                risk_order,
                result,
                still_active,
            });
        }

        exits
    }

    /// Subscribe the risk monitor to `symbol` ticks. Idempotent.
    pub async fn watch_symbol(&self, symbol: &str) {
        {
            let mut watched = self.watched.lock().await;
            if !watched.insert(symbol.to_string()) {
                return;
            }
        }

        let engine = self.self_ref.clone();
        let subscription = Subscription::task(move |symbol: Symbol, _quote: PriceQuote| {
            let engine = engine.clone();
            async move {
                if let Some(engine) = engine.upgrade() {
                    engine.check_risk_orders_at_market(&symbol).await;
                }
            }
        });

        self.price_stream.subscribe_to_symbol(symbol, subscription).await;
        info!("Risk monitor watching {}", symbol);
    }

    pub async fn watched_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.watched.lock().await.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Active stop-losses and take-profits keyed by symbol.
    pub async fn risk_orders(&self) -> RiskOrdersSnapshot {
        self.state.lock().await.risk_orders.snapshot()
    }

    /// Drop every risk order on `symbol`. Returns how many were removed.
    pub async fn cancel_risk_orders(&self, symbol: &str) -> usize {
        let canceled = self.state.lock().await.risk_orders.cancel_symbol(symbol);
        if !canceled.is_empty() {
            info!("Canceled {} risk orders on {}", canceled.len(), symbol);
        }
        canceled.len()
    }

    pub async fn cancel_risk_order(&self, id: RiskOrderId) -> bool {
        let removed = self.state.lock().await.risk_orders.remove(id);
        if let Some(order) = &removed {
            info!("Canceled risk order {} on {}", id, order.symbol);
        }
        removed.is_some()
    }
}
