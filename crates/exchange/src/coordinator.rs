//! Tick coordinator: bounded task queue, runner pool, periodic timer, and
//! the market-update bus.
//!
//! Two task kinds flow through the queue: `ProcessOrder` (the asynchronous
//! submission path, retried with exponential backoff on transient errors)
//! and `MarketTick` (produced by the periodic timer for every live item).
//! A fixed-size pool of runner tasks drains the queue; tick results publish
//! snapshots on a bounded broadcast bus where a lagging subscriber loses the
//! oldest undelivered events (drop-oldest back-pressure).
//!
//! The timer prefers to drop its own enqueue attempt over blocking: a full
//! queue costs a tick, never a stall.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, info, warn};
use types::{ExchangeConfig, ItemId, MarketUpdate, Order, Timestamp, UpdateKind};

use crate::clock::now_millis;
use crate::error::{ExchangeError, Result};
use crate::feed::MarketFeed;
use crate::pool::{TickOutcome, WorkerPool};

/// Update bus depth. A subscriber further behind than this loses events.
const BUS_CAPACITY: usize = 256;

/// Work items accepted by the coordinator queue.
#[derive(Debug)]
pub enum Task {
    /// Submit an order on the asynchronous path.
    ProcessOrder(Order),
    /// Step one item's market.
    MarketTick(ItemId),
}

// =============================================================================
// Statistics
// =============================================================================

/// Live counters maintained by the coordinator.
#[derive(Debug)]
pub struct ExchangeStats {
    orders_processed: AtomicU64,
    trades_matched: AtomicU64,
    updates_broadcast: AtomicU64,
    ticks_dropped: AtomicU64,
    last_tick_ms: AtomicU64,
    started_at: Instant,
}

impl ExchangeStats {
    fn new() -> Self {
        Self {
            orders_processed: AtomicU64::new(0),
            trades_matched: AtomicU64::new(0),
            updates_broadcast: AtomicU64::new(0),
            ticks_dropped: AtomicU64::new(0),
            last_tick_ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_order(&self) {
        self.orders_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tick(&self, now: Timestamp, trades: u64) {
        self.trades_matched.fetch_add(trades, Ordering::Relaxed);
        self.last_tick_ms.store(now, Ordering::Relaxed);
    }

    fn record_broadcast(&self) {
        self.updates_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_tick(&self) {
        self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the coordinator counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub orders_processed: u64,
    pub trades_matched: u64,
    pub updates_broadcast: u64,
    pub ticks_dropped: u64,
    pub active_workers: usize,
    pub workers_restarted: u64,
    pub uptime_secs: u64,
    pub last_tick: Option<Timestamp>,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Drives the periodic tick across the pool and publishes snapshots.
pub struct TickCoordinator {
    pool: Arc<WorkerPool>,
    task_tx: mpsc::Sender<Task>,
    bus: broadcast::Sender<MarketUpdate>,
    /// Latest published update per item; seeds `Init` events for new
    /// subscribers without a worker round-trip.
    latest: Arc<RwLock<HashMap<ItemId, MarketUpdate>>>,
    stats: Arc<ExchangeStats>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TickCoordinator {
    /// Start runners and the periodic timer.
    pub fn start(config: &ExchangeConfig, pool: Arc<WorkerPool>) -> Self {
        let (task_tx, task_rx) = mpsc::channel(config.queue_capacity);
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let latest: Arc<RwLock<HashMap<ItemId, MarketUpdate>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let stats = Arc::new(ExchangeStats::new());

        let queue = Arc::new(tokio::sync::Mutex::new(task_rx));
        let mut tasks = Vec::with_capacity(config.worker_pool_size + 1);

        for runner_id in 0..config.worker_pool_size {
            tasks.push(tokio::spawn(run_runner(
                runner_id,
                Arc::clone(&queue),
                Arc::clone(&pool),
                bus.clone(),
                Arc::clone(&latest),
                Arc::clone(&stats),
                config.clone(),
                shutdown_rx.clone(),
            )));
        }
        tasks.push(tokio::spawn(run_timer(
            config.tick_interval_ms,
            task_tx.clone(),
            Arc::clone(&pool),
            Arc::clone(&stats),
            shutdown_rx,
        )));

        info!(
            runners = config.worker_pool_size,
            tick_interval_ms = config.tick_interval_ms,
            "tick coordinator started"
        );

        Self {
            pool,
            task_tx,
            bus,
            latest,
            stats,
            shutdown_tx,
            tasks: Mutex::new(tasks),
        }
    }

    /// Enqueue an order on the asynchronous path.
    ///
    /// Fails fast with `BACKPRESSURE` when the bounded queue is full.
    pub fn enqueue_order(&self, order: Order) -> Result<()> {
        use mpsc::error::TrySendError;
        match self.task_tx.try_send(Task::ProcessOrder(order)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExchangeError::Backpressure),
            Err(TrySendError::Closed(_)) => {
                Err(ExchangeError::Invariant("task queue closed".to_string()))
            }
        }
    }

    /// Attach a new subscriber to the update bus.
    ///
    /// The feed yields one `Init` event per live item before live updates.
    pub fn subscribe(&self) -> MarketFeed {
        let inits: Vec<MarketUpdate> = self
            .latest
            .read()
            .values()
            .map(|update| {
                let mut init = update.clone();
                init.kind = UpdateKind::Init;
                init
            })
            .collect();
        MarketFeed::new(inits, self.bus.subscribe())
    }

    /// Shared counters handle.
    pub(crate) fn stats_handle(&self) -> Arc<ExchangeStats> {
        Arc::clone(&self.stats)
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            orders_processed: self.stats.orders_processed.load(Ordering::Relaxed),
            trades_matched: self.stats.trades_matched.load(Ordering::Relaxed),
            updates_broadcast: self.stats.updates_broadcast.load(Ordering::Relaxed),
            ticks_dropped: self.stats.ticks_dropped.load(Ordering::Relaxed),
            active_workers: self.pool.worker_count(),
            workers_restarted: self.pool.total_crashes(),
            uptime_secs: self.stats.started_at.elapsed().as_secs(),
            last_tick: match self.stats.last_tick_ms.load(Ordering::Relaxed) {
                0 => None,
                ms => Some(ms),
            },
        }
    }

    /// Stop the timer and runners, awaiting each.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("tick coordinator stopped");
    }
}

// =============================================================================
// Runner and timer loops
// =============================================================================

#[allow(clippy::too_many_arguments)]
async fn run_runner(
    runner_id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    pool: Arc<WorkerPool>,
    bus: broadcast::Sender<MarketUpdate>,
    latest: Arc<RwLock<HashMap<ItemId, MarketUpdate>>>,
    stats: Arc<ExchangeStats>,
    config: ExchangeConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let task = tokio::select! {
            _ = shutdown.changed() => break,
            task = async { queue.lock().await.recv().await } => match task {
                Some(task) => task,
                None => break,
            },
        };

        match task {
            Task::MarketTick(item_id) => match pool.tick(&item_id).await {
                Ok(outcome) => {
                    publish_tick(&item_id, outcome, &bus, &latest, &stats);
                }
                Err(err) => {
                    warn!(runner = runner_id, item = %item_id, %err, "tick failed");
                }
            },
            Task::ProcessOrder(order) => {
                process_order_with_retries(&pool, &stats, &config, order).await;
            }
        }
    }
    debug!(runner = runner_id, "runner stopped");
}

/// Publish price (and trade) updates for one tick result.
fn publish_tick(
    item_id: &str,
    outcome: TickOutcome,
    bus: &broadcast::Sender<MarketUpdate>,
    latest: &RwLock<HashMap<ItemId, MarketUpdate>>,
    stats: &ExchangeStats,
) {
    let now = now_millis();
    stats.record_tick(now, outcome.trades.len() as u64);

    let update = MarketUpdate {
        kind: UpdateKind::Price,
        item_id: item_id.to_string(),
        current_price: outcome.current_price,
        best_bid: outcome.best_bid,
        best_ask: outcome.best_ask,
        timestamp: now,
    };
    latest.write().insert(item_id.to_string(), update.clone());

    // Send errors only mean nobody is subscribed right now.
    let _ = bus.send(update.clone());
    stats.record_broadcast();

    if !outcome.trades.is_empty() {
        let _ = bus.send(MarketUpdate {
            kind: UpdateKind::Trade,
            ..update
        });
        stats.record_broadcast();
    }
}

/// Drive one queued submission through its retry budget.
async fn process_order_with_retries(
    pool: &WorkerPool,
    stats: &ExchangeStats,
    config: &ExchangeConfig,
    order: Order,
) {
    for attempt in 0..=config.max_retries {
        match pool.submit(order.clone()).await {
            Ok(_) => {
                stats.record_order();
                return;
            }
            Err(err) if err.is_retryable() && attempt < config.max_retries => {
                let delay = config.retry_delay_ms.saturating_mul(1 << attempt.min(16));
                debug!(item = %order.item_id, attempt, %err, "retrying queued order");
                sleep(Duration::from_millis(delay)).await;
            }
            Err(err) => {
                warn!(item = %order.item_id, %err, "queued order failed");
                return;
            }
        }
    }
}

async fn run_timer(
    tick_interval_ms: u64,
    task_tx: mpsc::Sender<Task>,
    pool: Arc<WorkerPool>,
    stats: Arc<ExchangeStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_millis(tick_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                for item_id in pool.items() {
                    use mpsc::error::TrySendError;
                    match task_tx.try_send(Task::MarketTick(item_id)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            // Dropping a tick beats blocking the timer.
                            stats.record_dropped_tick();
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
            }
        }
    }
    debug!("tick timer stopped");
}
