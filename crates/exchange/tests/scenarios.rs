//! End-to-end scenarios for the exchange fabric.
//!
//! Each test drives the public facade the way an external surface would:
//! open markets, create sessions, submit orders, step ticks, and observe
//! trades, balances, and the update bus.

use exchange::{Exchange, ExchangeError, WorkerStatus};
use types::{
    Cash, ExchangeConfig, MarketParams, Order, OrderSide, OrderStatus, Price, Quantity,
    UpdateKind,
};

/// Deterministic config: no stochastic price movement, manual ticks.
fn quiet_config() -> ExchangeConfig {
    ExchangeConfig::default()
        .with_tick_interval_ms(3_600_000)
        .with_market(MarketParams::default().with_volatility(0.0).with_drift(0.0))
}

fn limit(player: types::PlayerId, item: &str, side: OrderSide, price: f64, qty: f64) -> Order {
    Order::limit(
        player,
        item,
        side,
        Price::from_float(price),
        Quantity::from_float(qty),
    )
}

/// Scenario 1: basic cross. One bid and one ask that cross trade exactly
/// once at the ask price, and both sides leave the book.
#[tokio::test]
async fn basic_cross() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("BTC", Price::from_float(50_000.0))
        .await
        .unwrap();

    let alice = exchange.create_session(None);
    let bob = exchange.create_session(None);

    let bid = exchange
        .submit_order(limit(alice, "BTC", OrderSide::Buy, 50_000.0, 1.5))
        .await
        .unwrap();

    // Sellers without inventory are rejected at submission.
    let err = exchange
        .submit_order(limit(bob, "BTC", OrderSide::Sell, 49_900.0, 1.5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "INSUFFICIENT_INVENTORY");

    exchange
        .grant_inventory(bob, "BTC", Quantity::from_float(1.5))
        .await
        .unwrap();
    let ask = exchange
        .submit_order(limit(bob, "BTC", OrderSide::Sell, 49_900.0, 1.5))
        .await
        .unwrap();

    let outcome = exchange.tick("BTC").await.unwrap();
    assert_eq!(outcome.trades.len(), 1);

    let trade = &outcome.trades[0];
    assert_eq!(trade.quantity, Quantity::from_float(1.5));
    assert_eq!(trade.price, Price::from_float(49_900.0));
    assert_eq!(trade.buy_order_id, bid.order_id);
    assert_eq!(trade.sell_order_id, ask.order_id);

    let book = exchange.get_order_book("BTC").await.unwrap();
    assert!(book.bids.is_empty());
    assert!(book.asks.is_empty());

    exchange.shutdown().await;
}

async fn seed_inventory(exchange: &Exchange, player: types::PlayerId, item: &str, qty: f64) {
    exchange
        .grant_inventory(player, item, Quantity::from_float(qty))
        .await
        .unwrap();
}

/// Scenario 2: partial fill on the bid; remainder keeps id and price.
#[tokio::test]
async fn partial_fill_on_bid() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("GOLD", Price::from_float(52.0))
        .await
        .unwrap();

    let buyer = exchange.create_session(None);
    let seller = exchange.create_session(None);
    seed_inventory(&exchange, seller, "GOLD", 100.0).await;

    let bid = exchange
        .submit_order(limit(buyer, "GOLD", OrderSide::Buy, 55.0, 150.0))
        .await
        .unwrap();
    exchange
        .submit_order(limit(seller, "GOLD", OrderSide::Sell, 50.0, 100.0))
        .await
        .unwrap();

    let outcome = exchange.tick("GOLD").await.unwrap();
    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].price, Price::from_float(50.0));
    assert_eq!(outcome.trades[0].quantity, Quantity::from_float(100.0));

    let book = exchange.get_order_book("GOLD").await.unwrap();
    assert!(book.asks.is_empty());
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.bids[0].id, bid.order_id);
    assert_eq!(book.bids[0].remaining_quantity, Quantity::from_float(50.0));
    assert_eq!(
        book.bids[0].status,
        OrderStatus::Partial {
            filled: Quantity::from_float(100.0)
        }
    );

    exchange.shutdown().await;
}

/// Scenario 3: multi-level cascade across two bid and two ask levels.
#[tokio::test]
async fn multi_level_cascade() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("GOLD", Price::from_float(52.0))
        .await
        .unwrap();

    let buyer = exchange.create_session(None);
    let seller = exchange.create_session(None);
    seed_inventory(&exchange, seller, "GOLD", 150.0).await;

    exchange
        .submit_order(limit(buyer, "GOLD", OrderSide::Buy, 55.0, 100.0))
        .await
        .unwrap();
    let bid_53 = exchange
        .submit_order(limit(buyer, "GOLD", OrderSide::Buy, 53.0, 100.0))
        .await
        .unwrap();
    exchange
        .submit_order(limit(seller, "GOLD", OrderSide::Sell, 50.0, 75.0))
        .await
        .unwrap();
    exchange
        .submit_order(limit(seller, "GOLD", OrderSide::Sell, 52.0, 75.0))
        .await
        .unwrap();

    let outcome = exchange.tick("GOLD").await.unwrap();
    assert_eq!(outcome.trades.len(), 3);

    let summary: Vec<(f64, f64)> = outcome
        .trades
        .iter()
        .map(|t| (t.quantity.to_float(), t.price.to_float()))
        .collect();
    assert_eq!(summary, vec![(75.0, 50.0), (25.0, 52.0), (50.0, 52.0)]);

    let book = exchange.get_order_book("GOLD").await.unwrap();
    assert!(book.asks.is_empty());
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.bids[0].id, bid_53.order_id);
    assert_eq!(book.bids[0].remaining_quantity, Quantity::from_float(50.0));

    exchange.shutdown().await;
}

/// Scenario 4: cancel refunds the reserved balance and empties the book.
#[tokio::test]
async fn cancel_refunds() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("GOLD", Price::from_float(100.0))
        .await
        .unwrap();

    let player = exchange.create_session(Some(Cash::from_float(1_000.0)));

    let receipt = exchange
        .submit_order(limit(player, "GOLD", OrderSide::Buy, 100.0, 5.0))
        .await
        .unwrap();
    assert_eq!(
        exchange.get_account(player).await.unwrap().balance(),
        Cash::from_float(500.0)
    );

    exchange.cancel_order("GOLD", receipt.order_id).await.unwrap();
    assert_eq!(
        exchange.get_account(player).await.unwrap().balance(),
        Cash::from_float(1_000.0)
    );

    let book = exchange.get_order_book("GOLD").await.unwrap();
    assert!(book.bids.is_empty() && book.asks.is_empty());

    // Cancelling again reports the order as unknown.
    let err = exchange
        .cancel_order("GOLD", receipt.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "UNKNOWN_ORDER");

    exchange.shutdown().await;
}

/// Scenario 5: a crashing market clamps at the price floor instead of going
/// negative or NaN.
#[tokio::test]
async fn price_floor_holds() {
    let config = ExchangeConfig::default()
        .with_tick_interval_ms(3_600_000)
        .with_market(
            MarketParams::default()
                .with_drift(-0.5)
                .with_volatility(0.5),
        );
    let exchange = Exchange::new(config);
    exchange
        .spawn_market("DUST", Price::from_float(0.01))
        .await
        .unwrap();

    for _ in 0..1000 {
        let outcome = exchange.tick("DUST").await.unwrap();
        assert!(outcome.current_price >= Price::FLOOR);
        assert!(outcome.current_price.to_float().is_finite());
    }

    exchange.shutdown().await;
}

/// Scenario 6: crash and restart. The in-flight request fails, the worker
/// backs off, and a fresh submission succeeds against retained state.
#[tokio::test]
async fn crash_and_restart() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("X", Price::from_float(10.0))
        .await
        .unwrap();
    let player = exchange.create_session(None);

    exchange
        .submit_order(limit(player, "X", OrderSide::Buy, 9.0, 1.0))
        .await
        .unwrap();

    exchange.crash_market("X").await.unwrap();
    assert_eq!(exchange.market_status("X"), Some(WorkerStatus::Crashed));

    // Requests during the backoff window report the worker unavailable.
    match exchange
        .submit_order(limit(player, "X", OrderSide::Buy, 9.1, 1.0))
        .await
    {
        Ok(_) => {} // backoff already elapsed on a slow runner
        Err(err) => assert!(matches!(err, ExchangeError::WorkerUnavailable(_))),
    }

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    exchange
        .submit_order(limit(player, "X", OrderSide::Buy, 9.2, 1.0))
        .await
        .unwrap();
    assert_eq!(exchange.market_status("X"), Some(WorkerStatus::Running));

    // The pre-crash order survived the restart.
    let book = exchange.get_order_book("X").await.unwrap();
    assert!(book.bids.iter().any(|o| o.limit_price() == Some(Price::from_float(9.0))));

    assert!(exchange.stats().workers_restarted >= 1);

    exchange.shutdown().await;
}

/// A market order with no opposing liquidity rests and fills when liquidity
/// arrives on a later tick.
#[tokio::test]
async fn market_order_rests_until_liquidity() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("BTC", Price::from_float(100.0))
        .await
        .unwrap();

    let buyer = exchange.create_session(None);
    let seller = exchange.create_session(None);
    seed_inventory(&exchange, seller, "BTC", 2.0).await;

    exchange
        .submit_order(Order::market(
            buyer,
            "BTC",
            OrderSide::Buy,
            Quantity::from_float(2.0),
        ))
        .await
        .unwrap();

    let outcome = exchange.tick("BTC").await.unwrap();
    assert!(outcome.trades.is_empty());
    assert_eq!(exchange.get_order_book("BTC").await.unwrap().bids.len(), 1);

    exchange
        .submit_order(limit(seller, "BTC", OrderSide::Sell, 95.0, 2.0))
        .await
        .unwrap();
    let outcome = exchange.tick("BTC").await.unwrap();
    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].price, Price::from_float(95.0));

    exchange.shutdown().await;
}

/// Balances and inventories never go negative across a busy sequence.
#[tokio::test]
async fn non_negativity_holds_across_activity() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("GOLD", Price::from_float(100.0))
        .await
        .unwrap();

    let players: Vec<_> = (0..4).map(|_| exchange.create_session(None)).collect();
    for &p in &players {
        seed_inventory(&exchange, p, "GOLD", 50.0).await;
    }

    for round in 0..10u64 {
        for (i, &p) in players.iter().enumerate() {
            let price = 95.0 + (round as f64 + i as f64) % 10.0;
            let side = if (round + i as u64) % 2 == 0 {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            // Some of these are rejected for lack of funds or stock; that
            // is part of the scenario.
            let _ = exchange
                .submit_order(limit(p, "GOLD", side, price, 5.0))
                .await;
        }
        exchange.tick("GOLD").await.unwrap();

        for &p in &players {
            let account = exchange.get_account(p).await.unwrap();
            assert!(!account.balance().is_negative());
        }
    }

    exchange.shutdown().await;
}

/// The update bus delivers init-then-price per subscriber and routes by the
/// actual ticking item.
#[tokio::test]
async fn subscription_stream() {
    let config = ExchangeConfig::default()
        .with_tick_interval_ms(10)
        .with_market(MarketParams::default().with_volatility(0.0).with_drift(0.0));
    let exchange = Exchange::new(config);
    exchange
        .spawn_market("BTC", Price::from_float(100.0))
        .await
        .unwrap();
    exchange
        .spawn_market("GOLD", Price::from_float(50.0))
        .await
        .unwrap();

    // Let the periodic timer land a few ticks.
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    let mut feed = exchange.subscribe_market();
    let mut seen_items = std::collections::HashSet::new();
    let mut inits = 0;

    for _ in 0..12 {
        let update = feed.recv().await.unwrap();
        if update.kind == UpdateKind::Init {
            inits += 1;
        }
        assert!(update.current_price.is_positive());
        seen_items.insert(update.item_id.clone());
    }

    assert_eq!(inits, 2, "one init per live item");
    assert!(seen_items.contains("BTC"));
    assert!(seen_items.contains("GOLD"));

    exchange.shutdown().await;
}

/// Spawning the same market twice keeps one worker and its original price.
#[tokio::test]
async fn spawn_is_idempotent() {
    let exchange = Exchange::new(quiet_config());
    exchange
        .spawn_market("BTC", Price::from_float(123.0))
        .await
        .unwrap();
    exchange
        .spawn_market("BTC", Price::from_float(456.0))
        .await
        .unwrap();

    assert_eq!(exchange.list_items().len(), 1);
    let overview = exchange.get_market("BTC").await.unwrap();
    assert_eq!(overview.current_price, Price::from_float(123.0));

    exchange.shutdown().await;
}
