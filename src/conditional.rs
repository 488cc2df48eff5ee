//! Conditional exits: stop-loss and take-profit.
//!
//! Risk orders are one-shot triggers stored apart from positions. They are
//! evaluated on every tick for their symbol and removed the moment they fire.
//! Several may exist per symbol, one per partial exit plan.

use crate::types::{Price, RiskOrderId, Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of conditional exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskOrderKind {
    /// Sells when price falls to or below the trigger.
    StopLoss,
    /// Sells when price rises to or above the trigger.
    TakeProfit,
}

/// How the trigger price is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCondition {
    Above,
    Below,
}

impl RiskOrderKind {
    pub fn trigger_condition(&self) -> TriggerCondition {
        match self {
            RiskOrderKind::StopLoss => TriggerCondition::Below,
            RiskOrderKind::TakeProfit => TriggerCondition::Above,
        }
    }
}

/// A standing exit instruction tied to a price threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskOrder {
    pub id: RiskOrderId,
    pub symbol: Symbol,
    pub kind: RiskOrderKind,
    pub trigger_price: Price,
    /// Units to sell when triggered.
    pub quantity: u64,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl RiskOrder {
    pub fn new_stop_loss(
        id: RiskOrderId,
        symbol: Symbol,
        trigger_price: Price,
        quantity: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            kind: RiskOrderKind::StopLoss,
            trigger_price,
            quantity,
            is_active: true,
            created_at: timestamp,
        }
    }

    pub fn new_take_profit(
        id: RiskOrderId,
        symbol: Symbol,
        trigger_price: Price,
        quantity: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            kind: RiskOrderKind::TakeProfit,
            trigger_price,
            quantity,
            is_active: true,
            created_at: timestamp,
        }
    }

    /// Check if this order should fire at the given price.
    pub fn should_trigger(&self, price: Price) -> bool {
        if !self.is_active {
            return false;
        }
        match self.kind.trigger_condition() {
            TriggerCondition::Above => price >= self.trigger_price,
            TriggerCondition::Below => price <= self.trigger_price,
        }
    }
}

/// Active risk orders, grouped by symbol in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskOrderBook {
    stop_losses: BTreeMap<Symbol, Vec<RiskOrder>>,
    take_profits: BTreeMap<Symbol, Vec<RiskOrder>>,
    next_id: u64,
}

impl Default for RiskOrderBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every active risk order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskOrdersSnapshot {
    pub stop_losses: BTreeMap<Symbol, Vec<RiskOrder>>,
    pub take_profits: BTreeMap<Symbol, Vec<RiskOrder>>,
}

impl RiskOrderBook {
    pub fn new() -> Self {
        Self {
            stop_losses: BTreeMap::new(),
            take_profits: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Generate a new risk order ID.
    pub fn next_id(&mut self) -> RiskOrderId {
        let id = RiskOrderId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_stop_loss(&mut self, symbol: &str, trigger_price: Price, quantity: u64, timestamp: Timestamp) -> RiskOrderId {
        let id = self.next_id();
        self.insert(RiskOrder::new_stop_loss(id, symbol.to_string(), trigger_price, quantity, timestamp));
        id
    }

    pub fn add_take_profit(&mut self, symbol: &str, trigger_price: Price, quantity: u64, timestamp: Timestamp) -> RiskOrderId {
        let id = self.next_id();
        self.insert(RiskOrder::new_take_profit(id, symbol.to_string(), trigger_price, quantity, timestamp));
        id
    }

    pub fn insert(&mut self, order: RiskOrder) {
        let lists = match order.kind {
            RiskOrderKind::StopLoss => &mut self.stop_losses,
            RiskOrderKind::TakeProfit => &mut self.take_profits,
        };
        lists.entry(order.symbol.clone()).or_default().push(order);
    }

    /// Remove one order by id. Removing an id that is already gone is a no-op.
    pub fn remove(&mut self, id: RiskOrderId) -> Option<RiskOrder> {
        for lists in [&mut self.stop_losses, &mut self.take_profits] {
            let mut emptied = None;
            let mut removed = None;
            for (symbol, orders) in lists.iter_mut() {
                if let Some(pos) = orders.iter().position(|o| o.id == id) {
                    let mut order = orders.remove(pos);
                    order.is_active = false;
                    removed = Some(order);
                    if orders.is_empty() {
                        emptied = Some(symbol.clone());
                    }
                    break;
                }
            }
            if let Some(symbol) = emptied {
                lists.remove(&symbol);
            }
            if removed.is_some() {
                return removed;
            }
        }
        None
    }

    pub fn get(&self, id: RiskOrderId) -> Option<&RiskOrder> {
        self.stop_losses
            .values()
            .chain(self.take_profits.values())
            .flatten()
            .find(|o| o.id == id)
    }

    /// Orders for `symbol` that fire at `price`: stop-losses first, each kind in registration order.
    pub fn check_triggers(&self, symbol: &str, price: Price) -> Vec<RiskOrder> {
        let stops = self.stop_losses.get(symbol).into_iter().flatten();
        let takes = self.take_profits.get(symbol).into_iter().flatten();
        stops
            .chain(takes)
            .filter(|order| order.should_trigger(price))
            .cloned()
            .collect()
    }

    pub fn for_symbol(&self, symbol: &str) -> Vec<&RiskOrder> {
        let stops = self.stop_losses.get(symbol).into_iter().flatten();
        let takes = self.take_profits.get(symbol).into_iter().flatten();
        stops.chain(takes).collect()
    }

    /// Cancel every risk order on `symbol`.
    pub fn cancel_symbol(&mut self, symbol: &str) -> Vec<RiskOrder> {
        let mut canceled = self.stop_losses.remove(symbol).unwrap_or_default();
        canceled.extend(self.take_profits.remove(symbol).unwrap_or_default());
        for order in &mut canceled {
            order.is_active = false;
        }
        canceled
    }

    pub fn snapshot(&self) -> RiskOrdersSnapshot {
        RiskOrdersSnapshot {
            stop_losses: self.stop_losses.clone(),
            take_profits: self.take_profits.clone(),
        }
    }

    /// Total number of risk orders.
    pub fn len(&self) -> usize {
        self.stop_losses.values().chain(self.take_profits.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SYM: &str = "NSE:SBIN-EQ";

    fn px(v: rust_decimal::Decimal) -> Price {
        Price::new_unchecked(v)
    }

    #[test]
    fn stop_loss_triggers_at_or_below() {
        let order = RiskOrder::new_stop_loss(RiskOrderId(1), SYM.into(), px(dec!(545)), 100, Timestamp::from_millis(0));

        assert_eq!(order.kind.trigger_condition(), TriggerCondition::Below);
        assert!(!order.should_trigger(px(dec!(545.05))));
        assert!(order.should_trigger(px(dec!(545))));
        assert!(order.should_trigger(px(dec!(500))));
    }

    #[test]
    fn take_profit_triggers_at_or_above() {
        let order = RiskOrder::new_take_profit(RiskOrderId(1), SYM.into(), px(dec!(560)), 100, Timestamp::from_millis(0));

        assert_eq!(order.kind.trigger_condition(), TriggerCondition::Above);
        assert!(!order.should_trigger(px(dec!(559.99))));
        assert!(order.should_trigger(px(dec!(560))));
        assert!(order.should_trigger(px(dec!(600))));
    }

    #[test]
    fn inactive_order_never_triggers() {
        let mut order = RiskOrder::new_stop_loss(RiskOrderId(1), SYM.into(), px(dec!(545)), 100, Timestamp::from_millis(0));
        order.is_active = false;
        assert!(!order.should_trigger(px(dec!(1))));
    }

    #[test]
    fn book_operations() {
        let mut book = RiskOrderBook::new();
        let ts = Timestamp::from_millis(0);

        let sl = book.add_stop_loss(SYM, px(dec!(545)), 100, ts);
        let tp = book.add_take_profit(SYM, px(dec!(560)), 100, ts);
        book.add_stop_loss("NSE:INFY-EQ", px(dec!(1380)), 10, ts);

        assert_eq!(book.len(), 3);
        assert_eq!(book.for_symbol(SYM).len(), 2);
        assert_ne!(sl, tp);

        // crash only fires the stop
        let fired = book.check_triggers(SYM, px(dec!(540)));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, sl);

        let removed = book.remove(sl).unwrap();
        assert!(!removed.is_active);
        assert_eq!(book.len(), 2);

        // already gone
        assert!(book.remove(sl).is_none());
        assert!(book.get(tp).is_some());
    }

    #[test]
    fn triggers_in_registration_order() {
        let mut book = RiskOrderBook::new();
        let ts = Timestamp::from_millis(0);

        let tp1 = book.add_take_profit(SYM, px(dec!(560)), 50, ts);
        let sl1 = book.add_stop_loss(SYM, px(dec!(600)), 10, ts);
        let tp2 = book.add_take_profit(SYM, px(dec!(555)), 50, ts);
        let sl2 = book.add_stop_loss(SYM, px(dec!(610)), 20, ts);

        let fired: Vec<RiskOrderId> = book.check_triggers(SYM, px(dec!(580))).iter().map(|o| o.id).collect();
        assert_eq!(fired, vec![sl1, sl2, tp1, tp2]);
    }

    #[test]
    fn cancel_symbol_clears_both_kinds() {
        let mut book = RiskOrderBook::new();
        let ts = Timestamp::from_millis(0);

        for i in 1..=3 {
            book.add_stop_loss(SYM, px(dec!(540)), i, ts);
        }
        book.add_take_profit(SYM, px(dec!(570)), 6, ts);
        book.add_take_profit("NSE:INFY-EQ", px(dec!(1500)), 1, ts);

        let canceled = book.cancel_symbol(SYM);
        assert_eq!(canceled.len(), 4);
        assert!(canceled.iter().all(|o| !o.is_active));
        assert_eq!(book.len(), 1);

        let snapshot = book.snapshot();
        assert!(snapshot.stop_losses.is_empty());
        assert_eq!(snapshot.take_profits["NSE:INFY-EQ"].len(), 1);
    }
}
