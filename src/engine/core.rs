// 5.0 engine/core.rs: the engine object. wallet, positions, history and risk orders
// all sit in one EngineState behind one lock.

use super::config::EngineConfig;
use crate::conditional::RiskOrderBook;
use crate::order::ExecutedOrder;
use crate::position::Position;
use crate::price_feed::LivePriceStream;
use crate::types::{Amount, OrderId, Symbol};
use log::info;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/** 5.1: everything a fill mutates. only reachable through the engine lock */
/// Outside the engine this is a read-only copy, as returned by `snapshot_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub(super) wallet_balance: Amount,
    pub(super) positions: BTreeMap<Symbol, Position>,
    pub(super) order_history: Vec<ExecutedOrder>,
    pub(super) risk_orders: RiskOrderBook,
    pub(super) next_order_id: u64,
}

impl EngineState {
    fn new(initial_balance: Amount) -> Self {
        Self {
            wallet_balance: initial_balance,
            positions: BTreeMap::new(),
            order_history: Vec::new(),
            risk_orders: RiskOrderBook::new(),
            next_order_id: 1,
        }
    }

    // one counter for both sides
    pub(super) fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }
}

/** 5.2: live execution engine. construct once, share the Arc */
#[derive(Debug)]
pub struct LiveTradingEngine {
    pub(super) config: EngineConfig,
    pub(super) initial_balance: Amount,
    pub(super) price_stream: Arc<LivePriceStream>,
    pub(super) state: Mutex<EngineState>,
    // symbols the risk monitor already listens to
    pub(super) watched: Mutex<HashSet<Symbol>>,
    pub(super) self_ref: Weak<LiveTradingEngine>,
}

impl LiveTradingEngine {
    pub fn new(initial_balance: Amount, price_stream: Arc<LivePriceStream>, config: EngineConfig) -> Arc<Self> {
        info!(
            "Live trading engine initialized with wallet {} (commission rate {})",
            initial_balance, config.commission_rate
        );
        Arc::new_cyclic(|self_ref| Self {
            config,
            initial_balance,
            price_stream,
            state: Mutex::new(EngineState::new(initial_balance)),
            watched: Mutex::new(HashSet::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn price_stream(&self) -> &Arc<LivePriceStream> {
        &self.price_stream
    }

    /// Balance at construction. Never changes.
    pub fn initial_balance(&self) -> Amount {
        self.initial_balance
    }

    pub async fn wallet_balance(&self) -> Amount {
        self.state.lock().await.wallet_balance
    }

    /// Executed orders in execution order, optionally for one symbol.
    pub async fn order_history(&self, symbol: Option<&str>) -> Vec<ExecutedOrder> {
        let state = self.state.lock().await;
        state
            .order_history
            .iter()
            .filter(|order| symbol.map_or(true, |s| order.symbol == s))
            .cloned()
            .collect()
    }

    /// Open positions sorted by symbol.
    pub async fn positions(&self) -> Vec<Position> {
        self.state.lock().await.positions.values().cloned().collect()
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.state.lock().await.positions.get(symbol).cloned()
    }

    /// Consistent copy of the whole state, taken under one lock.
    pub async fn snapshot_state(&self) -> EngineState {
        self.state.lock().await.clone()
    }
}

impl EngineState {
    pub fn wallet_balance(&self) -> Amount {
        self.wallet_balance
    }

    pub fn positions(&self) -> &BTreeMap<Symbol, Position> {
        &self.positions
    }

    pub fn order_history(&self) -> &[ExecutedOrder] {
        &self.order_history
    }

    pub fn risk_orders(&self) -> &RiskOrderBook {
        &self.risk_orders
    }
}
