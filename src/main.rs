//! Trading Arena - demo driver.
//!
//! Opens a handful of markets, creates simulated player sessions, and lets
//! them trade against each other while the periodic tick loop moves prices
//! and matches orders.
//!
//! # Architecture
//!
//! ```text
//! demo traders ──submit──▶ Exchange ──route──▶ per-item market workers
//!                             │                        │
//!                             │◀── MarketUpdate bus ◀──┘ (tick loop)
//! ```

mod config;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use types::{ExchangeConfig, Order, OrderSide, PlayerId, Price, Quantity};

use exchange::Exchange;

pub use config::DemoConfig;

#[tokio::main]
async fn main() -> exchange::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let demo = DemoConfig::default();
    let exchange = Exchange::new(ExchangeConfig::default());

    for (item_id, price) in &demo.items {
        exchange
            .spawn_market(item_id.clone(), Price::from_float(*price))
            .await?;
    }

    // Player sessions, each seeded with stock to sell.
    let players: Vec<PlayerId> = (0..demo.num_players)
        .map(|_| exchange.create_session(None))
        .collect();
    for &player in &players {
        for (item_id, _) in &demo.items {
            exchange
                .grant_inventory(player, item_id, demo.seed_inventory)
                .await?;
        }
    }
    info!(
        players = players.len(),
        markets = demo.items.len(),
        "arena opened"
    );

    // Log the update stream in the background.
    let mut feed = exchange.subscribe_market();
    let feed_task = tokio::spawn(async move {
        while let Some(update) = feed.recv().await {
            debug!(
                item = %update.item_id,
                price = %update.current_price,
                kind = ?update.kind,
                "market update"
            );
        }
        if feed.dropped() > 0 {
            debug!(dropped = feed.dropped(), "feed lagged");
        }
    });

    let mut rng = StdRng::seed_from_u64(demo.seed);
    for round in 0..demo.rounds {
        for &player in &players {
            if !rng.random_bool(demo.order_probability) {
                continue;
            }

            let (item_id, _) = &demo.items[rng.random_range(0..demo.items.len())];
            let overview = exchange.get_market(item_id).await?;
            let side = if rng.random_bool(0.5) {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            let offset = 1.0 + rng.random_range(-demo.price_deviation..demo.price_deviation);
            let price = Price::from_float(overview.current_price.to_float() * offset);
            let quantity =
                Quantity::from_float(rng.random_range(demo.min_quantity..demo.max_quantity));

            let order = Order::limit(player, item_id.clone(), side, price, quantity);
            // Rejections (insufficient funds or stock) are part of the game.
            match exchange.submit_order(order).await {
                Ok(receipt) => {
                    debug!(player = %player, order = %receipt.order_id, %side, "order accepted")
                }
                Err(err) => debug!(player = %player, %err, "order rejected"),
            }
        }

        if round % 50 == 0 {
            let stats = exchange.stats();
            info!(
                round,
                orders = stats.orders_processed,
                trades = stats.trades_matched,
                "progress"
            );
        }
        tokio::time::sleep(Duration::from_millis(demo.round_delay_ms)).await;
    }

    for (item_id, _) in &demo.items {
        match exchange.get_market(item_id).await {
            Ok(overview) => info!(
                item = %overview.item_id,
                price = %overview.current_price,
                bid = ?overview.best_bid.map(|p| p.to_float()),
                ask = ?overview.best_ask.map(|p| p.to_float()),
                "closing market"
            ),
            Err(err) => warn!(item = %item_id, %err, "market unavailable at close"),
        }
    }

    let stats = exchange.stats();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).expect("stats serialize")
    );

    exchange.shutdown().await;
    feed_task.abort();
    Ok(())
}
