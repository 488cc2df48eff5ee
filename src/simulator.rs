// Simulated market feed
//
// Any tick producer implements QuoteSource. SimulatedFeed draws a uniform offset
// around a base price per instrument, in whole cents, and quotes a fixed
// half-spread on each side. pump_feed drives a source into the price stream.

use crate::price_feed::{LivePriceStream, PriceQuote};
use crate::types::{Symbol, Timestamp};
use log::{debug, warn};
use rand::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anything that can produce quotes for the stream.
pub trait QuoteSource: Send {
    /// Human readable name
    fn name(&self) -> &str;

    /// Next batch of quotes, one per instrument at most.
    fn next_quotes(&mut self, now: Timestamp) -> Vec<PriceQuote>;

    /// Check if the source is healthy/connected
    fn is_healthy(&self) -> bool {
        true
    }
}

/// One simulated instrument: price wanders uniformly in `base +/- range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedInstrument {
    pub symbol: Symbol,
    pub base_price: Decimal,
    pub range: Decimal,
}

impl SimulatedInstrument {
    pub fn new(symbol: impl Into<Symbol>, base_price: Decimal, range: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            base_price,
            range,
        }
    }
}

pub fn default_instruments() -> Vec<SimulatedInstrument> {
    vec![
        SimulatedInstrument::new("NSE:SBIN-EQ", dec!(550.00), dec!(5)),
        SimulatedInstrument::new("NSE:INFY-EQ", dec!(1400.00), dec!(20)),
    ]
}

pub struct SimulatedFeed {
    instruments: Vec<SimulatedInstrument>,
    half_spread: Decimal,
    rng: StdRng,
    healthy: bool,
}

impl SimulatedFeed {
    pub const DEFAULT_HALF_SPREAD: Decimal = dec!(0.25);

    /// Seeded for reproducible runs; `None` draws from entropy.
    pub fn new(instruments: Vec<SimulatedInstrument>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            instruments,
            half_spread: Self::DEFAULT_HALF_SPREAD,
            rng,
            healthy: true,
        }
    }

    pub fn with_half_spread(mut self, half_spread: Decimal) -> Self {
        self.half_spread = half_spread;
        self
    }

    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn instruments(&self) -> &[SimulatedInstrument] {
        &self.instruments
    }

    fn quote_for(&mut self, index: usize, now: Timestamp) -> Option<PriceQuote> {
        let instrument = &self.instruments[index];
        let range_cents = (instrument.range * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0).max(0);
        let offset_cents = self.rng.gen_range(-range_cents..=range_cents);
        let last = instrument.base_price + Decimal::new(offset_cents, 2);
        let volume = self.rng.gen_range(50_000..=200_000);

        match PriceQuote::new(
            instrument.symbol.clone(),
            last - self.half_spread,
            last + self.half_spread,
            last,
            volume,
            now,
        ) {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!("Simulated quote for {} rejected: {}", instrument.symbol, e);
                None
            }
        }
    }
}

impl QuoteSource for SimulatedFeed {
    fn name(&self) -> &str {
        "simulator"
    }

    fn next_quotes(&mut self, now: Timestamp) -> Vec<PriceQuote> {
        (0..self.instruments.len())
            .filter_map(|i| self.quote_for(i, now))
            .collect()
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

/// Push `ticks` rounds from `source` into `stream`, one round per `interval`.
///
/// Subscriber tasks are left detached. Returns the number of quotes published.
pub async fn pump_feed<S: QuoteSource>(
    source: &mut S,
    stream: &LivePriceStream,
    interval: Duration,
    ticks: usize,
) -> usize {
    let mut timer = tokio::time::interval(interval);
    let mut published = 0;

    for _ in 0..ticks {
        timer.tick().await;
        if !source.is_healthy() {
            warn!("Quote source {} unhealthy, skipping tick", source.name());
            continue;
        }
        for quote in source.next_quotes(Timestamp::now()) {
            debug!("[{}] {} @ {}", source.name(), quote.symbol, quote.last_price);
            let symbol = quote.symbol.clone();
            drop(stream.update_price(&symbol, quote).await);
            published += 1;
        }
    }

    published
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_stay_in_range() {
        let mut feed = SimulatedFeed::new(default_instruments(), Some(7));
        for _ in 0..200 {
            for quote in feed.next_quotes(Timestamp::from_millis(0)) {
                let (base, range) = if quote.symbol == "NSE:SBIN-EQ" {
                    (dec!(550), dec!(5))
                } else {
                    (dec!(1400), dec!(20))
                };
                let last = quote.last_price.value();
                assert!(last >= base - range && last <= base + range);
                assert_eq!(quote.spread(), dec!(0.50));
                assert!(last.scale() <= 2);
                assert!((50_000..=200_000).contains(&quote.volume));
            }
        }
    }

    #[test]
    fn same_seed_same_prices() {
        let mut a = SimulatedFeed::new(default_instruments(), Some(42));
        let mut b = SimulatedFeed::new(default_instruments(), Some(42));
        let ts = Timestamp::from_millis(0);
        for _ in 0..10 {
            assert_eq!(a.next_quotes(ts), b.next_quotes(ts));
        }
    }

    #[tokio::test]
    async fn pump_skips_unhealthy_source() {
        let stream = LivePriceStream::new();
        let mut feed = SimulatedFeed::new(default_instruments(), Some(1));

        let published = pump_feed(&mut feed, &stream, Duration::from_millis(1), 3).await;
        assert_eq!(published, 6);
        assert_eq!(stream.symbols().await.len(), 2);

        feed.set_healthy(false);
        assert_eq!(pump_feed(&mut feed, &stream, Duration::from_millis(1), 3).await, 0);
    }
}
