// live-trading-core: live order execution and risk management.
// fills are bookkeeping at the streamed quote: buys at ask, sells at bid.
// one engine lock serializes every mutation; stop-loss/take-profit exits
// run from the price feed under that same lock.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Symbol, OrderId, Side, Price, Amount, Timestamp
//   2.x  price_feed.rs: quote cache, pub/sub fan-out, dispatch handles
//   3.x  order.rs: executed order records
//   4.x  position.rs: holdings, weighted-average cost basis, pnl
//   4.5  conditional.rs: stop-loss / take-profit book
//   5.x  engine/: core state, market buy/sell, risk monitor, reporting
//   6.x  simulator.rs: quote sources and the feed pump
//   7.x  config.rs: wallet, commission, feed, env presets
//   8.x  api.rs: caller-facing operations and json commands

// core trading modules
pub mod engine;
pub mod order;
pub mod position;
pub mod types;

// risk modules
pub mod conditional;

// integration modules
pub mod api;
pub mod config;
pub mod price_feed;
pub mod simulator;

// re exports for convenience
pub use conditional::*;
pub use engine::*;
pub use order::*;
pub use position::*;
pub use types::*;
pub use api::{ApiError, ApiResponse, EngineCommand, EngineQuery, ErrorCode, ExecutionReport, HealthStatus, TradingApi};
pub use config::{ConfigError, Environment, FeedConfig, TradingConfig};
pub use price_feed::{Dispatch, LivePriceStream, PriceQuote, QuoteError, Subscription};
pub use simulator::{pump_feed, QuoteSource, SimulatedFeed, SimulatedInstrument};
