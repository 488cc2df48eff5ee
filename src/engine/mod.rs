// 5.0: live trading engine. owns the wallet, positions, order history and risk orders.
// fills are bookkeeping at the streamed quote. no broker is called from here.
// every mutation goes through one tokio mutex; the risk monitor runs under the same lock.

mod config;
mod core;
mod orders;
mod reporting;
mod results;
mod risk;

pub use config::{EngineConfig, RiskFailurePolicy};
pub use core::{EngineState, LiveTradingEngine};
pub use reporting::{realized_pnl, PortfolioSnapshot, PositionPnl};
pub use results::{ExecutionError, TriggeredExit};
