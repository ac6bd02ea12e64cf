//! Exchange fabric for the trading arena.
//!
//! This crate layers the concurrency model on top of the `engine` core:
//!
//! - [`worker`]: one actor per tradable item, owning book, price engine,
//!   ledger slice, and reservations
//! - [`pool`]: spawns and routes to workers, fans out synchronized ticks
//! - [`coordinator`]: bounded task queue, runner pool, periodic tick timer,
//!   update bus, and statistics
//! - [`sessions`]: player session issuance and funding records
//! - [`feed`]: per-subscriber market update stream
//!
//! The only structures that cross threads are the message channels and the
//! update bus; every ledger slice is owned by exactly one worker, and the
//! session directory and worker map belong to the dispatcher tier. Account
//! reads travel as `GetAccount` round trips.
//!
//! [`Exchange`] is the external-facing entry point: it validates requests,
//! records new sessions, and forwards to the owning worker, which enforces
//! balances and inventories on its own ledger slice.
//!
//! # Example
//!
//! ```no_run
//! use exchange::Exchange;
//! use types::{ExchangeConfig, Order, OrderSide, Price, Quantity};
//!
//! # async fn run() -> exchange::Result<()> {
//! let exchange = Exchange::new(ExchangeConfig::default());
//! exchange.spawn_market("BTC", Price::from_float(50_000.0)).await?;
//!
//! let alice = exchange.create_session(None);
//! let order = Order::limit(
//!     alice,
//!     "BTC",
//!     OrderSide::Buy,
//!     Price::from_float(49_900.0),
//!     Quantity::from_float(0.5),
//! );
//! let receipt = exchange.submit_order(order).await?;
//! println!("resting as {}", receipt.order_id);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod pool;
pub mod sessions;
pub mod worker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use types::{
    Cash, ExchangeConfig, ItemId, MarketOverview, Order, OrderId, OrderStatus, PlayerId, Price,
    Quantity,
};

pub use coordinator::{StatsSnapshot, TickCoordinator};
pub use engine::Account;
pub use error::{ExchangeError, Result};
pub use feed::MarketFeed;
pub use pool::{TickOutcome, WorkerPool};
pub use sessions::SessionDirectory;
pub use worker::WorkerStatus;

use coordinator::ExchangeStats;

// =============================================================================
// Facade payloads
// =============================================================================

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Id assigned by the owning worker.
    pub order_id: OrderId,
    /// Status at acceptance time (always resting; matching happens on ticks).
    pub status: OrderStatus,
}

/// Priority-ordered snapshot of one market's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookView {
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

// =============================================================================
// Exchange
// =============================================================================

/// External-facing entry point for the trading arena.
///
/// Must be created inside a tokio runtime: construction starts the runner
/// pool and the periodic tick timer.
pub struct Exchange {
    config: ExchangeConfig,
    sessions: SessionDirectory,
    pool: Arc<WorkerPool>,
    coordinator: TickCoordinator,
    stats: Arc<ExchangeStats>,
}

impl Exchange {
    /// Build the full fabric and start the tick loop.
    pub fn new(config: ExchangeConfig) -> Self {
        let sessions = SessionDirectory::new(config.starting_balance);
        let pool = Arc::new(WorkerPool::new(config.clone(), sessions.clone()));
        let coordinator = TickCoordinator::start(&config, Arc::clone(&pool));
        let stats = coordinator.stats_handle();
        info!("exchange started");
        Self {
            config,
            sessions,
            pool,
            coordinator,
            stats,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Markets
    // -------------------------------------------------------------------------

    /// Open a market for an item. Idempotent.
    pub async fn spawn_market(
        &self,
        item_id: impl Into<ItemId>,
        initial_price: Price,
    ) -> Result<()> {
        self.pool.spawn(item_id, initial_price).await
    }

    /// Close an item's market gracefully.
    pub async fn remove_market(&self, item_id: &str) -> Result<()> {
        self.pool.remove(item_id).await
    }

    /// Items with a live market.
    pub fn list_items(&self) -> Vec<ItemId> {
        self.pool.items()
    }

    /// Lifecycle status of an item's worker.
    pub fn market_status(&self, item_id: &str) -> Option<WorkerStatus> {
        self.pool.status(item_id)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Create a player session funded with the given balance (or the
    /// configured default).
    pub fn create_session(&self, initial_balance: Option<Cash>) -> PlayerId {
        self.sessions.create_session(initial_balance)
    }

    /// Remove a player session.
    pub fn end_session(&self, player_id: PlayerId) -> Result<()> {
        self.sessions.end_session(player_id)
    }

    /// A player's balance and inventory, aggregated across markets.
    ///
    /// Each worker holds the slice for players who traded its item; this
    /// collects them via round-trip queries and merges holdings. A player
    /// who has not traded anywhere reports the session's starting balance.
    pub async fn get_account(&self, player_id: PlayerId) -> Result<Account> {
        let starting = self
            .sessions
            .starting_balance(player_id)
            .ok_or(ExchangeError::UnknownPlayer(player_id))?;

        let slices = self.pool.collect_accounts(player_id).await;
        if slices.is_empty() {
            return Ok(Account::new(player_id, starting));
        }

        let total: Cash = slices.iter().map(Account::balance).sum();
        let mut account = Account::new(player_id, total);
        for slice in &slices {
            for (item_id, quantity) in slice.holdings() {
                account.add_inventory(item_id.clone(), *quantity);
            }
        }
        Ok(account)
    }

    /// Grant a player inventory on an item's market.
    ///
    /// Game-master seam: sellers are rejected when they lack stock, so a
    /// game has to seed initial holdings explicitly through this call.
    pub async fn grant_inventory(
        &self,
        player_id: PlayerId,
        item_id: &str,
        quantity: Quantity,
    ) -> Result<()> {
        self.pool.grant_inventory(item_id, player_id, quantity).await
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Validate and forward an order to its market.
    ///
    /// Validation covers what the dispatcher can know without worker state:
    /// order shape, session existence, market existence. Balance and
    /// inventory are enforced by the owning worker when it reserves.
    pub async fn submit_order(&self, order: Order) -> Result<OrderReceipt> {
        self.validate(&order)?;
        let order_id = self.pool.submit(order).await?;
        self.stats.record_order();
        Ok(OrderReceipt {
            order_id,
            status: OrderStatus::Pending,
        })
    }

    /// Queue an order on the asynchronous path.
    ///
    /// Returns immediately; fails fast with `BACKPRESSURE` when the task
    /// queue is full. Delivery is retried on transient errors.
    pub fn enqueue_order(&self, order: Order) -> Result<()> {
        self.validate(&order)?;
        self.coordinator.enqueue_order(order)
    }

    /// Cancel a resting order and refund its unfilled remainder.
    pub async fn cancel_order(&self, item_id: &str, order_id: OrderId) -> Result<()> {
        self.pool.cancel(item_id, order_id).await
    }

    // -------------------------------------------------------------------------
    // Market data
    // -------------------------------------------------------------------------

    /// Priority-ordered snapshot of an item's book.
    pub async fn get_order_book(&self, item_id: &str) -> Result<OrderBookView> {
        let (bids, asks) = self.pool.get_order_book(item_id).await?;
        Ok(OrderBookView { bids, asks })
    }

    /// Point-in-time overview of an item's market.
    pub async fn get_market(&self, item_id: &str) -> Result<MarketOverview> {
        self.pool.get_market(item_id).await
    }

    /// Attach a subscriber to the market update bus.
    ///
    /// The feed starts with one `init` event per live item, then yields a
    /// `price` event per tick (plus `trade` events on ticks with fills).
    pub fn subscribe_market(&self) -> MarketFeed {
        self.coordinator.subscribe()
    }

    /// Coordinator statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.coordinator.stats()
    }

    // -------------------------------------------------------------------------
    // Manual stepping and lifecycle
    // -------------------------------------------------------------------------

    /// Step one item's market immediately (outside the periodic timer).
    pub async fn tick(&self, item_id: &str) -> Result<TickOutcome> {
        self.pool.tick(item_id).await
    }

    /// Step every market in parallel and collect the results.
    pub async fn tick_all(&self) -> std::collections::HashMap<ItemId, Result<TickOutcome>> {
        self.pool.tick_all().await
    }

    /// Stop the tick loop and every worker. In-flight requests resolve
    /// `WORKER_UNAVAILABLE`.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        self.pool.stop().await;
        info!("exchange stopped");
    }

    /// Crash the worker for an item. Fault-injection hook for restart tests.
    #[doc(hidden)]
    pub async fn crash_market(&self, item_id: &str) -> Result<()> {
        self.pool.inject_fault(item_id).await
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate(&self, order: &Order) -> Result<()> {
        if order.quantity.is_zero() {
            return Err(ExchangeError::Validation(
                "order quantity must be positive".to_string(),
            ));
        }
        if let Some(price) = order.limit_price() {
            if !price.is_positive() {
                return Err(ExchangeError::Validation(
                    "limit order price must be positive".to_string(),
                ));
            }
        }
        if !self.sessions.contains(order.player_id) {
            return Err(ExchangeError::UnknownPlayer(order.player_id));
        }
        if !self.pool.contains(&order.item_id) {
            return Err(ExchangeError::NoWorker(order.item_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{MarketParams, OrderSide};

    fn quiet_config() -> ExchangeConfig {
        ExchangeConfig::default()
            .with_tick_interval_ms(3_600_000)
            .with_market(MarketParams::default().with_volatility(0.0).with_drift(0.0))
    }

    #[tokio::test]
    async fn test_submit_requires_session_and_market() {
        let exchange = Exchange::new(quiet_config());
        exchange
            .spawn_market("BTC", Price::from_float(100.0))
            .await
            .unwrap();

        let ghost_order = Order::limit(
            PlayerId(999),
            "BTC",
            OrderSide::Buy,
            Price::from_float(90.0),
            Quantity::from_float(1.0),
        );
        let err = exchange.submit_order(ghost_order).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION");

        let player = exchange.create_session(None);
        let homeless_order = Order::limit(
            player,
            "GHOST",
            OrderSide::Buy,
            Price::from_float(90.0),
            Quantity::from_float(1.0),
        );
        let err = exchange.submit_order(homeless_order).await.unwrap_err();
        assert_eq!(err.kind(), "NO_WORKER");

        exchange.shutdown().await;
    }

    #[tokio::test]
    async fn test_buy_over_balance_rejected_by_worker() {
        let exchange = Exchange::new(quiet_config());
        exchange
            .spawn_market("BTC", Price::from_float(100.0))
            .await
            .unwrap();
        let player = exchange.create_session(Some(Cash::from_float(50.0)));

        let order = Order::limit(
            player,
            "BTC",
            OrderSide::Buy,
            Price::from_float(100.0),
            Quantity::from_float(1.0),
        );
        let err = exchange.submit_order(order).await.unwrap_err();
        assert_eq!(err.kind(), "INSUFFICIENT_FUNDS");

        // The rejection left the slice untouched.
        let account = exchange.get_account(player).await.unwrap();
        assert_eq!(account.balance(), Cash::from_float(50.0));

        exchange.shutdown().await;
    }

    #[tokio::test]
    async fn test_untraded_player_reports_starting_balance() {
        let exchange = Exchange::new(quiet_config());
        let player = exchange.create_session(Some(Cash::from_float(777.0)));

        let account = exchange.get_account(player).await.unwrap();
        assert_eq!(account.balance(), Cash::from_float(777.0));
        assert!(account.holdings().is_empty());

        exchange.shutdown().await;
    }

    #[tokio::test]
    async fn test_shape_validation() {
        let exchange = Exchange::new(quiet_config());
        exchange
            .spawn_market("BTC", Price::from_float(100.0))
            .await
            .unwrap();
        let player = exchange.create_session(None);

        let zero_qty = Order::limit(
            player,
            "BTC",
            OrderSide::Buy,
            Price::from_float(100.0),
            Quantity::ZERO,
        );
        assert_eq!(
            exchange.submit_order(zero_qty).await.unwrap_err().kind(),
            "VALIDATION"
        );

        let free_limit = Order::limit(
            player,
            "BTC",
            OrderSide::Buy,
            Price::ZERO,
            Quantity::from_float(1.0),
        );
        assert_eq!(
            exchange.submit_order(free_limit).await.unwrap_err().kind(),
            "VALIDATION"
        );

        exchange.shutdown().await;
    }
}
