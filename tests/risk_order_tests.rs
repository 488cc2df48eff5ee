//! Stop-loss / take-profit tests driven through the price feed.
//!
//! Ticks go in through `TradingApi::ingest_price`, which waits for the risk
//! monitor to finish, so every assertion sees post-tick state.

use live_trading_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const SBIN: &str = "NSE:SBIN-EQ";

fn setup() -> (TradingApi, Arc<LiveTradingEngine>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let stream = Arc::new(LivePriceStream::new());
    let engine = LiveTradingEngine::new(Amount::new(dec!(500000)), stream, EngineConfig::default());
    (TradingApi::new(engine.clone()), engine)
}

async fn tick(api: &TradingApi, bid: Decimal, ask: Decimal, last: Decimal) {
    api.ingest_price(SBIN, bid, ask, last, 100_000).await.unwrap();
}

fn count(book: &std::collections::BTreeMap<Symbol, Vec<RiskOrder>>) -> usize {
    book.values().map(Vec::len).sum()
}

#[tokio::test]
async fn round_trip_through_take_profit() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;

    let report = api.buy(SBIN, 100, None, Some(dec!(560.00))).await;
    assert!(report.success, "{}", report.message);
    assert_eq!(engine.wallet_balance().await.value(), dec!(444972.5));

    let position = engine.position(SBIN).await.unwrap();
    assert_eq!(position.quantity, 100);
    assert_eq!(position.avg_buy_price.value(), dec!(550.00));

    tick(&api, dec!(560.50), dec!(561.00), dec!(560.75)).await;

    assert!(engine.position(SBIN).await.is_none());
    assert_eq!(engine.wallet_balance().await.value(), dec!(500994.475));

    let history = engine.order_history(None).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].side, Side::Sell);
    assert_eq!(history[1].executed_price.value(), dec!(560.50));
    assert_eq!(history[1].commission.value(), dec!(28.025));

    let pnl = engine.get_portfolio_pnl().await;
    assert_eq!(pnl.total_realized_pnl.value(), dec!(1021.975));
    assert_eq!(pnl.total_unrealized_pnl, Amount::zero());
    assert_eq!(pnl.portfolio_value.value(), dec!(500994.475));
    assert_eq!(count(&api.risk_orders().await.take_profits), 0);
}

#[tokio::test]
async fn stop_loss_fires_at_or_below_trigger_only() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    api.buy(SBIN, 100, Some(dec!(545.00)), None).await;

    // above the trigger: untouched
    tick(&api, dec!(545.00), dec!(545.50), dec!(545.25)).await;
    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 100);
    assert_eq!(count(&api.risk_orders().await.stop_losses), 1);

    // exactly at the trigger: fires
    tick(&api, dec!(544.75), dec!(545.25), dec!(545.00)).await;
    assert!(engine.position(SBIN).await.is_none());
    assert_eq!(count(&api.risk_orders().await.stop_losses), 0);

    let sells: Vec<ExecutedOrder> = engine.order_history(None).await.into_iter().filter(|o| o.is_sell()).collect();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].quantity, 100);
    assert_eq!(sells[0].executed_price.value(), dec!(544.75));
}

#[tokio::test]
async fn take_profit_fires_at_or_above_trigger_only() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    api.buy(SBIN, 100, None, Some(dec!(560.00))).await;

    tick(&api, dec!(559.50), dec!(560.00), dec!(559.99)).await;
    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 100);

    tick(&api, dec!(559.75), dec!(560.25), dec!(560.00)).await;
    assert!(engine.position(SBIN).await.is_none());
    assert_eq!(count(&api.risk_orders().await.take_profits), 0);
}

#[tokio::test]
async fn fired_stop_never_fires_again() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    // 50 covered by the stop, 50 uncovered
    api.buy(SBIN, 50, Some(dec!(545.00)), None).await;
    api.buy(SBIN, 50, None, None).await;

    tick(&api, dec!(539.50), dec!(540.00), dec!(539.75)).await;
    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 50);

    for _ in 0..5 {
        tick(&api, dec!(529.50), dec!(530.00), dec!(529.75)).await;
    }

    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 50);
    assert_eq!(engine.order_history(None).await.len(), 3);
}

#[tokio::test]
async fn partial_exits_fire_independently() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    api.buy(SBIN, 30, None, Some(dec!(555.00))).await;
    api.buy(SBIN, 30, None, Some(dec!(565.00))).await;
    api.buy(SBIN, 40, Some(dec!(540.00)), None).await;

    tick(&api, dec!(556.00), dec!(556.50), dec!(556.25)).await;
    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 70);

    tick(&api, dec!(566.00), dec!(566.50), dec!(566.25)).await;
    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 40);

    let risk = api.risk_orders().await;
    assert_eq!(count(&risk.take_profits), 0);
    assert_eq!(count(&risk.stop_losses), 1);
}

#[tokio::test]
async fn one_tick_fires_stops_before_take_profits() {
    let (_, engine) = setup();
    let stream = engine.price_stream().clone();
    let quote = PriceQuote::new(SBIN, dec!(549.50), dec!(550.00), dec!(549.75), 0, Timestamp::now()).unwrap();
    stream.update_price(SBIN, quote).await.settled().await;

    engine
        .market_buy(SBIN, 10, None, Some(Price::new_unchecked(dec!(540))))
        .await
        .unwrap();
    engine
        .market_buy(SBIN, 10, Some(Price::new_unchecked(dec!(560))), None)
        .await
        .unwrap();

    // 550 is both below the stop and above the target
    let exits = engine.check_risk_orders(SBIN, Price::new_unchecked(dec!(550))).await;
    let kinds: Vec<RiskOrderKind> = exits.iter().map(TriggeredExit::kind).collect();
    assert_eq!(kinds, vec![RiskOrderKind::StopLoss, RiskOrderKind::TakeProfit]);
    assert!(exits.iter().all(|e| e.executed().is_some()));
    assert!(engine.position(SBIN).await.is_none());
}

#[tokio::test]
async fn cancelled_exits_do_not_fire() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    api.buy(SBIN, 100, Some(dec!(545.00)), Some(dec!(560.00))).await;

    assert_eq!(api.cancel_risk_orders(SBIN).await, 2);
    tick(&api, dec!(539.50), dec!(540.00), dec!(539.75)).await;

    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 100);
}

#[tokio::test]
async fn superseded_crash_does_not_fire_stop() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;
    api.buy(SBIN, 100, Some(dec!(545.00)), None).await;

    // two ticks published back to back, neither awaited before the next
    let stream = engine.price_stream().clone();
    let crash = PriceQuote::new(SBIN, dec!(539.50), dec!(540.00), dec!(539.75), 0, Timestamp::now()).unwrap();
    let recovery = PriceQuote::new(SBIN, dec!(559.50), dec!(560.00), dec!(559.75), 0, Timestamp::now()).unwrap();
    let first = stream.update_price(SBIN, crash).await;
    let second = stream.update_price(SBIN, recovery).await;
    first.settled().await;
    second.settled().await;

    assert_eq!(engine.position(SBIN).await.unwrap().quantity, 100);
    assert!(engine.order_history(None).await.iter().all(ExecutedOrder::is_buy));
    assert_eq!(count(&api.risk_orders().await.stop_losses), 1);
}

#[tokio::test]
async fn exit_registered_with_the_buy_sees_the_next_tick() {
    let (api, engine) = setup();
    tick(&api, dec!(549.50), dec!(550.00), dec!(549.75)).await;

    let report = api.buy(SBIN, 100, None, Some(dec!(551.00))).await;
    assert!(report.success, "{}", report.message);
    assert_eq!(engine.watched_symbols().await, vec![SBIN.to_string()]);

    tick(&api, dec!(551.50), dec!(552.00), dec!(551.75)).await;
    assert!(engine.position(SBIN).await.is_none());
}
