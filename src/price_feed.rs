// Live price stream
//
// Holds the latest quote per symbol and fans every tick out to subscribers.
// The engine trusts no other source for "current price". Where ticks come from
// (broker websocket, simulator, test harness) is the feed adapter's business.

use crate::types::{Price, Symbol, Timestamp};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Bid/ask/last snapshot for one symbol. Superseded, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: Symbol,
    /// Highest price a buyer is willing to pay. Sells fill here.
    pub bid_price: Price,
    /// Lowest price a seller is willing to accept. Buys fill here.
    pub ask_price: Price,
    pub last_price: Price,
    pub volume: u64,
    pub timestamp: Timestamp,
}

impl PriceQuote {
    pub fn new(
        symbol: impl Into<Symbol>,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        volume: u64,
        timestamp: Timestamp,
    ) -> Result<Self, QuoteError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(QuoteError::EmptySymbol);
        }

        let bid_price = Price::new(bid).ok_or(QuoteError::NonPositivePrice { field: "bid", value: bid })?;
        let ask_price = Price::new(ask).ok_or(QuoteError::NonPositivePrice { field: "ask", value: ask })?;
        let last_price = Price::new(last).ok_or(QuoteError::NonPositivePrice { field: "last", value: last })?;

        if bid_price > ask_price {
            return Err(QuoteError::CrossedQuote { bid, ask });
        }

        Ok(Self {
            symbol,
            bid_price,
            ask_price,
            last_price,
            volume,
            timestamp,
        })
    }

    pub fn mid_price(&self) -> Decimal {
        (self.bid_price.value() + self.ask_price.value()) / Decimal::TWO
    }

    pub fn spread(&self) -> Decimal {
        self.ask_price.value() - self.bid_price.value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("Quote symbol is empty")]
    EmptySymbol,

    #[error("Quote {field} price must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },

    #[error("Crossed quote: bid {bid} above ask {ask}")]
    CrossedQuote { bid: Decimal, ask: Decimal },
}

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type SyncCallback = dyn Fn(&str, &PriceQuote) + Send + Sync;
type TaskCallback = dyn Fn(Symbol, PriceQuote) -> BoxFuture + Send + Sync;

/// A registered interest in a symbol's ticks.
///
/// `Inline` callbacks run on the publisher's task and must be quick.
/// `Task` callbacks produce a future that is spawned on its own tokio task,
/// so a stalled subscriber never stalls the feed.
#[derive(Clone)]
pub enum Subscription {
    Inline(Arc<SyncCallback>),
    Task(Arc<TaskCallback>),
}

impl Subscription {
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&str, &PriceQuote) + Send + Sync + 'static,
    {
        Subscription::Inline(Arc::new(f))
    }

    pub fn task<F, Fut>(f: F) -> Self
    where
        F: Fn(Symbol, PriceQuote) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Subscription::Task(Arc::new(move |symbol: Symbol, quote: PriceQuote| {
            Box::pin(f(symbol, quote)) as BoxFuture
        }))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscription::Inline(_) => f.write_str("Subscription::Inline"),
            Subscription::Task(_) => f.write_str("Subscription::Task"),
        }
    }
}

/// Handles of the subscriber tasks spawned by one `update_price` call.
///
/// Dropping it leaves the tasks running detached.
#[derive(Debug, Default)]
#[must_use = "drop the dispatch to detach, or await settled() to wait for subscribers"]
pub struct Dispatch {
    symbol: Symbol,
    inline_notified: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl Dispatch {
    pub fn inline_notified(&self) -> usize {
        self.inline_notified
    }

    pub fn spawned(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every spawned subscriber task of this tick to finish.
    pub async fn settled(self) {
        for handle in self.tasks {
            if let Err(e) = handle.await {
                error!("Subscriber task for {} failed: {}", self.symbol, e);
            }
        }
    }
}

/// Latest-quote cache with per-symbol fan-out.
#[derive(Debug, Default)]
pub struct LivePriceStream {
    cache: RwLock<HashMap<Symbol, PriceQuote>>,
    subscribers: RwLock<HashMap<Symbol, Vec<Subscription>>>,
    connected: AtomicBool,
}

impl LivePriceStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `symbol`. Several per symbol are fine.
    pub async fn subscribe_to_symbol(&self, symbol: &str, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(symbol.to_string()).or_default().push(subscription);
        info!("Subscribed to {}", symbol);
    }

    /// Replace the cached quote for `symbol` and notify its subscribers.
    pub async fn update_price(&self, symbol: &str, quote: PriceQuote) -> Dispatch {
        if quote.symbol != symbol {
            warn!("Quote for {} published under {}", quote.symbol, symbol);
        }

        {
            let mut cache = self.cache.write().await;
            cache.insert(symbol.to_string(), quote.clone());
        }

        // clone the list so no lock is held while callbacks run
        let subscribers = {
            let subscribers = self.subscribers.read().await;
            subscribers.get(symbol).cloned().unwrap_or_default()
        };

        let mut dispatch = Dispatch {
            symbol: symbol.to_string(),
            ..Default::default()
        };

        for subscription in subscribers {
            match subscription {
                Subscription::Inline(callback) => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| callback(symbol, &quote)));
                    if outcome.is_err() {
                        error!("Callback error for {}: subscriber panicked", symbol);
                    }
                    dispatch.inline_notified += 1;
                }
                Subscription::Task(callback) => {
                    let fut = callback(symbol.to_string(), quote.clone());
                    dispatch.tasks.push(tokio::spawn(fut));
                }
            }
        }

        debug!(
            "Tick {} bid={} ask={} last={} -> {} inline, {} tasks",
            symbol,
            quote.bid_price,
            quote.ask_price,
            quote.last_price,
            dispatch.inline_notified,
            dispatch.tasks.len()
        );

        dispatch
    }

    /// Latest quote, or `None` if no tick ever arrived for `symbol`.
    pub async fn get_current_price(&self, symbol: &str) -> Option<PriceQuote> {
        self.cache.read().await.get(symbol).cloned()
    }

    pub async fn subscriber_count(&self, symbol: &str) -> usize {
        self.subscribers.read().await.get(symbol).map_or(0, Vec::len)
    }

    /// Symbols with a cached quote.
    pub async fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.cache.read().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn connect_to_market_feed(&self, source: &str) {
        self.connected.store(true, Ordering::Release);
        info!("Price stream connected to market feed ({})", source);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        info!("Price stream disconnected");
    }
}
