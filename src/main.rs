//! Live trading engine simulation.
//!
//! Runs the engine against scripted and simulated ticks: a full round trip,
//! a stop-loss crash, concurrent buyers racing for one wallet, and a
//! free-running simulated feed.

use live_trading_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

type SimResult = Result<(), Box<dyn Error>>;

const SBIN: &str = "NSE:SBIN-EQ";

#[tokio::main]
async fn main() -> SimResult {
    env_logger::init();

    let config = TradingConfig::default().with_env_overrides()?;

    println!("Live Trading Engine Simulation");
    println!(
        "Environment {:?}, wallet {}, commission rate {}\n",
        config.environment, config.initial_balance, config.engine.commission_rate
    );

    scenario_1_round_trip(&config).await?;
    scenario_2_stop_loss(&config).await?;
    scenario_3_concurrent_buyers(&config).await?;
    scenario_4_simulated_feed(&config).await?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn new_api(config: &TradingConfig) -> TradingApi {
    let stream = Arc::new(LivePriceStream::new());
    stream.connect_to_market_feed(&config.feed.source);
    let engine = LiveTradingEngine::new(Amount::new(config.initial_balance), stream, config.engine.clone());
    TradingApi::new(engine)
}

async fn tick(api: &TradingApi, bid: Decimal, ask: Decimal) -> Result<(), ApiError> {
    api.ingest_price(SBIN, bid, ask, (bid + ask) / Decimal::TWO, 100_000).await?;
    Ok(())
}

/// Buy with a take-profit, then let the market lift through it.
async fn scenario_1_round_trip(config: &TradingConfig) -> SimResult {
    println!("Scenario 1: Round Trip with Take-Profit\n");

    let api = new_api(config);
    tick(&api, dec!(549.50), dec!(550.00)).await?;

    let report = api.buy(SBIN, 100, None, Some(dec!(560.00))).await;
    println!("  {}", report.message);
    println!("  Wallet: {}", api.engine().wallet_balance().await);

    println!("  Market moves to 560.50 / 561.00...");
    tick(&api, dec!(560.50), dec!(561.00)).await?;

    let portfolio = api.portfolio().await;
    println!("  Open positions: {}", portfolio.active_positions_count);
    println!("  Wallet: {}", portfolio.wallet_balance);
    println!(
        "  Realized P&L: {} | Total P&L: {} ({:.4}%)\n",
        portfolio.total_realized_pnl, portfolio.total_pnl, portfolio.total_pnl_percent
    );
    Ok(())
}

/// Two partial exits on one position; a crash fires the stop only.
async fn scenario_2_stop_loss(config: &TradingConfig) -> SimResult {
    println!("Scenario 2: Stop-Loss on a Crash\n");

    let api = new_api(config);
    tick(&api, dec!(549.50), dec!(550.00)).await?;

    api.buy(SBIN, 60, Some(dec!(545.00)), None).await;
    api.buy(SBIN, 40, None, Some(dec!(570.00))).await;

    let position = api.engine().position(SBIN).await.ok_or("position missing")?;
    println!("  Holding {} @ {}", position.quantity, position.avg_buy_price);

    println!("  Market crashes to 540.00 / 540.50...");
    tick(&api, dec!(540.00), dec!(540.50)).await?;

    let position = api.engine().position(SBIN).await.ok_or("position missing")?;
    let risk = api.risk_orders().await;
    println!("  Holding {} after the stop", position.quantity);
    println!(
        "  Remaining exits: {} stop-loss, {} take-profit",
        risk.stop_losses.values().map(Vec::len).sum::<usize>(),
        risk.take_profits.values().map(Vec::len).sum::<usize>()
    );

    let pnl = api.portfolio().await;
    println!("  Unrealized P&L: {}\n", pnl.total_unrealized_pnl);
    Ok(())
}

/// Ten buyers race for a wallet that can afford four of them.
async fn scenario_3_concurrent_buyers(config: &TradingConfig) -> SimResult {
    println!("Scenario 3: Concurrent Buyers\n");

    let mut config = config.clone();
    // 4 * 100 * 550 * 1.0005 = 220110
    config.initial_balance = dec!(220110);
    let api = new_api(&config);
    tick(&api, dec!(549.50), dec!(550.00)).await?;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = api.engine().clone();
            tokio::spawn(async move { engine.market_buy(SBIN, 100, None, None).await })
        })
        .collect();

    let mut filled = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => filled += 1,
            Err(_) => rejected += 1,
        }
    }

    println!("  Filled: {}, rejected: {}", filled, rejected);
    println!("  Wallet: {}\n", api.engine().wallet_balance().await);
    Ok(())
}

/// Free-running simulator with exits on both sides.
async fn scenario_4_simulated_feed(config: &TradingConfig) -> SimResult {
    println!("Scenario 4: Simulated Feed\n");

    let api = new_api(config);
    let mut feed = SimulatedFeed::new(config.feed.instruments.clone(), config.feed.seed.or(Some(7)))
        .with_half_spread(config.feed.half_spread);
    let stream = api.engine().price_stream().clone();

    // prime every symbol so buys have a price
    pump_feed(&mut feed, &stream, Duration::from_millis(1), 1).await;

    for instrument in &config.feed.instruments {
        let stop = instrument.base_price - instrument.range / Decimal::TWO;
        let target = instrument.base_price + instrument.range / Decimal::TWO;
        let report = api.buy(&instrument.symbol, 10, Some(stop), Some(target)).await;
        println!("  {}", report.message);
    }

    let interval = Duration::from_millis(config.feed.tick_interval_ms.min(20));
    let published = pump_feed(&mut feed, &stream, interval, 50).await;
    // let detached risk tasks drain
    tokio::time::sleep(Duration::from_millis(50)).await;

    let portfolio = api.portfolio().await;
    println!("  Published {} ticks", published);
    println!("  Orders: {}, open positions: {}", portfolio.order_count, portfolio.active_positions_count);
    println!("  Portfolio value: {}", portfolio.portfolio_value);
    println!("  Total P&L: {} ({:.4}%)", portfolio.total_pnl, portfolio.total_pnl_percent);
    Ok(())
}
