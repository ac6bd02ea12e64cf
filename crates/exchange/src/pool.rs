//! Worker pool: spawns, routes to, and stops per-item market workers.
//!
//! The pool owns the item -> worker mapping. Requests route by item id and
//! fail with `NO_WORKER` when no worker owns the item; `tick_all` fans out to
//! every worker in parallel and collects all responses. There is no ordering
//! guarantee across workers beyond per-worker sequential consistency.
//!
//! The pool is dispatcher-tier: it holds the session directory so it can
//! attach each player's session funding to submissions, but player balances
//! and inventories live only inside the workers' own ledger slices —
//! account reads go through `GetAccount` round trips.

use std::collections::HashMap;
use std::sync::Arc;

use engine::Account;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use types::{ExchangeConfig, ItemId, MarketOverview, Order, OrderId, PlayerId, Price, Quantity, Trade};

use crate::error::{ExchangeError, Result};
use crate::sessions::SessionDirectory;
use crate::worker::{spawn_worker, WorkerHandle, WorkerRequest, WorkerResponse, WorkerStatus};

/// Result of one worker tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub trades: Vec<Trade>,
    pub current_price: Price,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

struct PoolEntry {
    handle: Arc<WorkerHandle>,
    join: JoinHandle<()>,
}

/// Pool of market workers, one per tradable item.
pub struct WorkerPool {
    config: ExchangeConfig,
    sessions: SessionDirectory,
    workers: RwLock<HashMap<ItemId, PoolEntry>>,
}

impl WorkerPool {
    /// Create an empty pool.
    pub fn new(config: ExchangeConfig, sessions: SessionDirectory) -> Self {
        Self {
            config,
            sessions,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn a worker for an item. Idempotent: a second spawn is a no-op.
    pub async fn spawn(&self, item_id: impl Into<ItemId>, initial_price: Price) -> Result<()> {
        let item_id = item_id.into();
        let handle = {
            let mut workers = self.workers.write();
            if workers.contains_key(&item_id) {
                return Ok(());
            }
            let (handle, join) = spawn_worker(
                item_id.clone(),
                initial_price,
                self.config.market.clone(),
                Duration::from_millis(self.config.request_timeout_ms),
            );
            workers.insert(
                item_id.clone(),
                PoolEntry {
                    handle: Arc::clone(&handle),
                    join,
                },
            );
            handle
        };

        let init = handle
            .request(WorkerRequest::Initialize {
                item_id: item_id.clone(),
                initial_price,
            })
            .await;
        if let Err(err) = init {
            warn!(item = %item_id, %err, "worker failed to initialize");
            self.workers.write().remove(&item_id);
            return Err(err);
        }
        info!(item = %item_id, price = %initial_price, "market spawned");
        Ok(())
    }

    /// Gracefully stop and delete the worker for an item.
    pub async fn remove(&self, item_id: &str) -> Result<()> {
        let entry = self
            .workers
            .write()
            .remove(item_id)
            .ok_or_else(|| ExchangeError::NoWorker(item_id.to_string()))?;

        entry.handle.state().set_status(WorkerStatus::Stopping);
        let _ = entry.handle.request(WorkerRequest::Shutdown).await;
        let _ = entry.join.await;
        info!(item = %item_id, "market removed");
        Ok(())
    }

    /// Route an order to the worker owning its item, attaching the player's
    /// session funding for first-contact slice creation.
    pub async fn submit(&self, order: Order) -> Result<OrderId> {
        let starting_balance = self
            .sessions
            .starting_balance(order.player_id)
            .ok_or(ExchangeError::UnknownPlayer(order.player_id))?;
        let handle = self.handle(&order.item_id)?;
        match handle
            .request(WorkerRequest::Submit {
                order,
                starting_balance,
            })
            .await?
        {
            WorkerResponse::OrderSubmitted { order_id } => Ok(order_id),
            other => Err(unexpected(other)),
        }
    }

    /// Cancel a resting order on an item's market.
    pub async fn cancel(&self, item_id: &str, order_id: OrderId) -> Result<()> {
        let handle = self.handle(item_id)?;
        match handle.request(WorkerRequest::Cancel { order_id }).await? {
            WorkerResponse::OrderCancelled { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Priority-ordered snapshot of an item's book.
    pub async fn get_order_book(&self, item_id: &str) -> Result<(Vec<Order>, Vec<Order>)> {
        let handle = self.handle(item_id)?;
        match handle.request(WorkerRequest::GetOrderBook).await? {
            WorkerResponse::OrderBook { bids, asks } => Ok((bids, asks)),
            other => Err(unexpected(other)),
        }
    }

    /// Point-in-time overview of an item's market.
    pub async fn get_market(&self, item_id: &str) -> Result<MarketOverview> {
        let handle = self.handle(item_id)?;
        match handle.request(WorkerRequest::GetMarket).await? {
            WorkerResponse::Market(overview) => Ok(overview),
            other => Err(unexpected(other)),
        }
    }

    /// Credit a player's inventory on an item's market.
    pub async fn grant_inventory(
        &self,
        item_id: &str,
        player_id: PlayerId,
        quantity: Quantity,
    ) -> Result<()> {
        let starting_balance = self
            .sessions
            .starting_balance(player_id)
            .ok_or(ExchangeError::UnknownPlayer(player_id))?;
        let handle = self.handle(item_id)?;
        match handle
            .request(WorkerRequest::GrantInventory {
                player_id,
                quantity,
                starting_balance,
            })
            .await?
        {
            WorkerResponse::Acknowledged => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Collect a player's ledger slices from every worker in parallel.
    ///
    /// Workers where the player never traded (or that are unavailable)
    /// contribute nothing.
    pub async fn collect_accounts(&self, player_id: PlayerId) -> Vec<Account> {
        let handles: Vec<Arc<WorkerHandle>> = self
            .workers
            .read()
            .values()
            .map(|e| Arc::clone(&e.handle))
            .collect();

        join_all(handles.iter().map(|handle| async move {
            handle.request(WorkerRequest::GetAccount { player_id }).await
        }))
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(WorkerResponse::Account(slice)) => slice,
            _ => None,
        })
        .collect()
    }

    /// Step one item's market.
    pub async fn tick(&self, item_id: &str) -> Result<TickOutcome> {
        let handle = self.handle(item_id)?;
        Self::tick_handle(&handle).await
    }

    /// Issue `Tick` to every worker in parallel and collect all responses.
    pub async fn tick_all(&self) -> HashMap<ItemId, Result<TickOutcome>> {
        let handles: Vec<Arc<WorkerHandle>> = self
            .workers
            .read()
            .values()
            .map(|e| Arc::clone(&e.handle))
            .collect();

        let results = join_all(handles.iter().map(|handle| async move {
            (
                handle.item_id().to_string(),
                Self::tick_handle(handle).await,
            )
        }))
        .await;

        results.into_iter().collect()
    }

    /// Stop all workers, awaiting each.
    pub async fn stop(&self) {
        let entries: Vec<(ItemId, PoolEntry)> = self.workers.write().drain().collect();
        for (item_id, entry) in entries {
            entry.handle.state().set_status(WorkerStatus::Stopping);
            let _ = entry.handle.request(WorkerRequest::Shutdown).await;
            let _ = entry.join.await;
            debug!(item = %item_id, "worker stopped");
        }
    }

    /// Items with a live worker.
    pub fn items(&self) -> Vec<ItemId> {
        self.workers.read().keys().cloned().collect()
    }

    /// Whether an item has a worker.
    pub fn contains(&self, item_id: &str) -> bool {
        self.workers.read().contains_key(item_id)
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }

    /// Lifecycle status of an item's worker.
    pub fn status(&self, item_id: &str) -> Option<WorkerStatus> {
        self.workers
            .read()
            .get(item_id)
            .map(|e| e.handle.state().status())
    }

    /// Total crashes recorded across all live workers.
    pub fn total_crashes(&self) -> u64 {
        self.workers
            .read()
            .values()
            .map(|e| e.handle.state().crash_count() as u64)
            .sum()
    }

    /// Crash the worker for an item. Fault-injection hook for restart tests.
    #[doc(hidden)]
    pub async fn inject_fault(&self, item_id: &str) -> Result<()> {
        let handle = self.handle(item_id)?;
        // The injected request itself fails with WORKER_UNAVAILABLE.
        let _ = handle.request(WorkerRequest::InjectFault).await;
        Ok(())
    }

    fn handle(&self, item_id: &str) -> Result<Arc<WorkerHandle>> {
        self.workers
            .read()
            .get(item_id)
            .map(|e| Arc::clone(&e.handle))
            .ok_or_else(|| ExchangeError::NoWorker(item_id.to_string()))
    }

    async fn tick_handle(handle: &WorkerHandle) -> Result<TickOutcome> {
        match handle.request(WorkerRequest::Tick).await? {
            WorkerResponse::TickCompleted {
                trades,
                current_price,
                best_bid,
                best_ask,
            } => Ok(TickOutcome {
                trades,
                current_price,
                best_bid,
                best_ask,
            }),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: WorkerResponse) -> ExchangeError {
    ExchangeError::Invariant(format!("unexpected worker response: {:?}", response))
}
