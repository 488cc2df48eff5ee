//! Caller-facing operations.
//!
//! `TradingApi` is what a transport adapter (HTTP handler, websocket bridge,
//! test harness) talks to. Every operation returns a value; nothing here
//! panics or propagates across the boundary. `EngineCommand` / `EngineQuery`
//! are the serde forms of the same operations for adapters that speak JSON.

use crate::conditional::RiskOrdersSnapshot;
use crate::engine::{ExecutionError, LiveTradingEngine, PortfolioSnapshot};
use crate::order::ExecutedOrder;
use crate::position::Position;
use crate::price_feed::{LivePriceStream, PriceQuote, QuoteError};
use crate::types::{Price, Symbol, Timestamp};
use log::{error, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    PriceUnavailable,
    InsufficientFunds,
    NoPosition,
    InsufficientQuantity,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::NoPosition => 404,
            ErrorCode::InsufficientQuantity => 409,
            ErrorCode::InsufficientFunds => 422,
            ErrorCode::PriceUnavailable => 503,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        let code = match &err {
            ExecutionError::InvalidQuantity(_) | ExecutionError::OrderTooLarge { .. } => ErrorCode::InvalidRequest,
            ExecutionError::PriceUnavailable(_) => ErrorCode::PriceUnavailable,
            ExecutionError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            ExecutionError::NoPosition(_) => ErrorCode::NoPosition,
            ExecutionError::InsufficientQuantity { .. } => ErrorCode::InsufficientQuantity,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<QuoteError> for ApiError {
    fn from(err: QuoteError) -> Self {
        ApiError::invalid(err.to_string())
    }
}

/// Outcome of a buy or sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<ExecutedOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ExecutionReport {
    fn filled(order: ExecutedOrder) -> Self {
        let message = format!(
            "{} EXECUTED: {} {} @ {} | Commission: {}",
            order.side, order.quantity, order.symbol, order.executed_price, order.commission
        );
        Self {
            success: true,
            message,
            order: Some(order),
            error: None,
        }
    }

    fn rejected(error: ApiError) -> Self {
        Self {
            success: false,
            message: error.message.clone(),
            order: None,
            error: Some(error),
        }
    }

    pub fn http_status(&self) -> u16 {
        self.error.as_ref().map_or(200, ApiError::http_status)
    }
}

impl From<Result<ExecutedOrder, ExecutionError>> for ExecutionReport {
    fn from(result: Result<ExecutedOrder, ExecutionError>) -> Self {
        match result {
            Ok(order) => Self::filled(order),
            Err(e) => Self::rejected(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub symbol: Symbol,
    pub inline_notified: usize,
    pub tasks_settled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub engine_ready: bool,
    pub price_stream_connected: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    Buy {
        symbol: Symbol,
        quantity: u64,
        #[serde(default)]
        stop_loss_price: Option<Decimal>,
        #[serde(default)]
        take_profit_price: Option<Decimal>,
    },
    Sell {
        symbol: Symbol,
        quantity: u64,
    },
    IngestPrice {
        symbol: Symbol,
        bid_price: Decimal,
        ask_price: Decimal,
        last_price: Decimal,
        #[serde(default)]
        volume: u64,
    },
    CancelRiskOrders {
        symbol: Symbol,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum EngineQuery {
    Portfolio,
    Orders {
        #[serde(default)]
        symbol: Option<Symbol>,
    },
    Positions,
    RiskOrders,
    Health,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ApiResponse {
    Execution(ExecutionReport),
    Ingested(IngestReport),
    Canceled { symbol: Symbol, canceled: usize },
    Portfolio(PortfolioSnapshot),
    Orders(Vec<ExecutedOrder>),
    Positions(Vec<Position>),
    RiskOrders(RiskOrdersSnapshot),
    Health(HealthStatus),
    Error(ApiError),
}

impl ApiResponse {
    pub fn http_status(&self) -> u16 {
        match self {
            ApiResponse::Execution(report) => report.http_status(),
            ApiResponse::Error(e) => e.http_status(),
            _ => 200,
        }
    }
}

/// Handle on one engine and its price stream.
#[derive(Debug, Clone)]
pub struct TradingApi {
    engine: Arc<LiveTradingEngine>,
    stream: Arc<LivePriceStream>,
}

impl TradingApi {
    pub fn new(engine: Arc<LiveTradingEngine>) -> Self {
        let stream = engine.price_stream().clone();
        Self { engine, stream }
    }

    pub fn engine(&self) -> &Arc<LiveTradingEngine> {
        &self.engine
    }

    /// Market buy with optional exits. Calling twice places two fills.
    pub async fn buy(
        &self,
        symbol: &str,
        quantity: u64,
        stop_loss_price: Option<Decimal>,
        take_profit_price: Option<Decimal>,
    ) -> ExecutionReport {
        let stop_loss = match trigger_price("stop_loss_price", stop_loss_price) {
            Ok(price) => price,
            Err(e) => return ExecutionReport::rejected(e),
        };
        let take_profit = match trigger_price("take_profit_price", take_profit_price) {
            Ok(price) => price,
            Err(e) => return ExecutionReport::rejected(e),
        };

        self.engine.market_buy(symbol, quantity, stop_loss, take_profit).await.into()
    }

    pub async fn sell(&self, symbol: &str, quantity: u64) -> ExecutionReport {
        self.engine.market_sell(symbol, quantity).await.into()
    }

    pub async fn portfolio(&self) -> PortfolioSnapshot {
        self.engine.get_portfolio_pnl().await
    }

    pub async fn orders(&self, symbol: Option<&str>) -> Vec<ExecutedOrder> {
        self.engine.order_history(symbol).await
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.engine.positions().await
    }

    pub async fn risk_orders(&self) -> RiskOrdersSnapshot {
        self.engine.risk_orders().await
    }

    pub async fn cancel_risk_orders(&self, symbol: &str) -> usize {
        self.engine.cancel_risk_orders(symbol).await
    }

    /// Feed one tick in and wait until every subscriber (risk monitor
    /// included) has handled it.
    pub async fn ingest_price(
        &self,
        symbol: &str,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        volume: u64,
    ) -> Result<IngestReport, ApiError> {
        let quote = PriceQuote::new(symbol, bid, ask, last, volume, Timestamp::now())?;
        let dispatch = self.stream.update_price(symbol, quote).await;
        let report = IngestReport {
            symbol: symbol.to_string(),
            inline_notified: dispatch.inline_notified(),
            tasks_settled: dispatch.spawned(),
        };
        dispatch.settled().await;
        Ok(report)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            engine_ready: true,
            price_stream_connected: self.stream.is_connected(),
            timestamp: Timestamp::now().to_rfc3339(),
        }
    }

    pub async fn execute(&self, command: EngineCommand) -> ApiResponse {
        match command {
            EngineCommand::Buy {
                symbol,
                quantity,
                stop_loss_price,
                take_profit_price,
            } => ApiResponse::Execution(self.buy(&symbol, quantity, stop_loss_price, take_profit_price).await),
            EngineCommand::Sell { symbol, quantity } => ApiResponse::Execution(self.sell(&symbol, quantity).await),
            EngineCommand::IngestPrice {
                symbol,
                bid_price,
                ask_price,
                last_price,
                volume,
            } => match self.ingest_price(&symbol, bid_price, ask_price, last_price, volume).await {
                Ok(report) => ApiResponse::Ingested(report),
                Err(e) => ApiResponse::Error(e),
            },
            EngineCommand::CancelRiskOrders { symbol } => {
                let canceled = self.cancel_risk_orders(&symbol).await;
                ApiResponse::Canceled { symbol, canceled }
            }
        }
    }

    pub async fn query(&self, query: EngineQuery) -> ApiResponse {
        match query {
            EngineQuery::Portfolio => ApiResponse::Portfolio(self.portfolio().await),
            EngineQuery::Orders { symbol } => ApiResponse::Orders(self.orders(symbol.as_deref()).await),
            EngineQuery::Positions => ApiResponse::Positions(self.positions().await),
            EngineQuery::RiskOrders => ApiResponse::RiskOrders(self.risk_orders().await),
            EngineQuery::Health => ApiResponse::Health(self.health()),
        }
    }

    /// Parse a JSON command and run it. Malformed payloads come back as `ApiResponse::Error`.
    pub async fn execute_json(&self, payload: &str) -> ApiResponse {
        match serde_json::from_str::<EngineCommand>(payload) {
            Ok(command) => {
                info!("API command: {:?}", command);
                self.execute(command).await
            }
            Err(e) => {
                error!("Rejected API payload: {}", e);
                ApiResponse::Error(ApiError::invalid(format!("Malformed command: {}", e)))
            }
        }
    }
}

// absent is fine, present must be a positive price
fn trigger_price(field: &str, value: Option<Decimal>) -> Result<Option<Price>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => Price::new(v)
            .map(Some)
            .ok_or_else(|| ApiError::invalid(format!("{} must be positive, got {}", field, v))),
    }
}
