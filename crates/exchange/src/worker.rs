//! Market worker: one actor per tradable item.
//!
//! A worker exclusively owns the order book, the price engine, its ledger
//! slice, and the reservations for its item. It drains an inbox of request
//! envelopes one at a time, mutates its own state, and answers through a
//! oneshot reply; no handler suspends. Nothing is shared across workers; all
//! cross-worker coordination is by message.
//!
//! # Ledger slice
//!
//! The worker's ledger holds the accounts of players who have interacted
//! with this item. A slice is created on a player's first contact, funded
//! with the session balance carried in the request envelope; the dispatcher
//! tier never reaches into it, it can only ask via `GetAccount`.
//!
//! # Reserve-on-submit / settle-on-fill
//!
//! Funds (buy) or inventory (sell) are debited when an order enters the book.
//! Each trade settles per fill: the buyer gains the item plus a refund of any
//! reserve-minus-trade price difference, the seller gains cash at the trade
//! price. Cancellation refunds the unfilled remainder.
//!
//! # Crash containment
//!
//! A panic inside a handler, or a typed invariant failure (a corrupt book, a
//! misrouted request), is caught at the actor boundary. The in-flight
//! request gets its reply, the worker transitions to `Crashed` keeping its
//! book, engine, and ledger, and it comes back after an exponential backoff
//! of `min(100ms * 2^n, 10s)` where n counts prior crashes.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use engine::{Account, Ledger, OrderBook, PriceEngine};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Duration, Instant};
use tracing::{debug, error, info, warn};
use types::{
    Cash, ItemId, MarketOverview, MarketParams, Order, OrderId, OrderSide, PlayerId, Price,
    Quantity, Timestamp, Trade,
};

use crate::clock::now_millis;
use crate::error::{ExchangeError, Result};

/// Inbox depth per worker.
const INBOX_CAPACITY: usize = 256;

// =============================================================================
// Protocol
// =============================================================================

/// Requests a worker serves, one at a time.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Reset book, engine, and ledger slice to a fresh market at the given
    /// price.
    Initialize {
        item_id: ItemId,
        initial_price: Price,
    },
    /// Reserve and rest an order. No matching happens on submission.
    ///
    /// `starting_balance` funds the player's ledger slice if this is their
    /// first contact with the worker.
    Submit {
        order: Order,
        starting_balance: Cash,
    },
    /// Remove a resting order and refund its unfilled remainder.
    Cancel { order_id: OrderId },
    /// Priority-ordered snapshot of both sides.
    GetOrderBook,
    /// Point-in-time market overview.
    GetMarket,
    /// Snapshot of a player's ledger slice, if one exists here.
    GetAccount { player_id: PlayerId },
    /// Credit a player's inventory (game-master seeding).
    GrantInventory {
        player_id: PlayerId,
        quantity: Quantity,
        starting_balance: Cash,
    },
    /// Step the price engine and run the matcher.
    Tick,
    /// Stop serving and exit the actor loop.
    Shutdown,
    /// Panic inside the handler. Fault-injection hook for restart tests.
    #[doc(hidden)]
    InjectFault,
}

/// Responses paired with [`WorkerRequest`].
#[derive(Debug, Clone)]
pub enum WorkerResponse {
    Acknowledged,
    OrderSubmitted {
        order_id: OrderId,
    },
    OrderCancelled {
        order_id: OrderId,
    },
    OrderBook {
        bids: Vec<Order>,
        asks: Vec<Order>,
    },
    Market(MarketOverview),
    /// `None` when the player has never interacted with this item.
    Account(Option<Account>),
    TickCompleted {
        trades: Vec<Trade>,
        current_price: Price,
        best_bid: Option<Price>,
        best_ask: Option<Price>,
    },
}

/// One request plus its reply channel.
pub(crate) struct Envelope {
    pub(crate) request: WorkerRequest,
    pub(crate) reply: oneshot::Sender<Result<WorkerResponse>>,
}

// =============================================================================
// Worker status
// =============================================================================

/// Lifecycle of a worker.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`, plus
/// `Running -> Crashed -> Starting` on fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

/// Shared status cell observed by the pool and the coordinator.
#[derive(Debug)]
pub struct WorkerState {
    item_id: ItemId,
    status: RwLock<WorkerStatus>,
    crash_count: AtomicU32,
    last_crash_ms: AtomicU64,
}

impl WorkerState {
    fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            status: RwLock::new(WorkerStatus::Starting),
            crash_count: AtomicU32::new(0),
            last_crash_ms: AtomicU64::new(0),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> WorkerStatus {
        *self.status.read()
    }

    /// Number of crashes so far.
    pub fn crash_count(&self) -> u32 {
        self.crash_count.load(Ordering::Relaxed)
    }

    /// Wall time of the last crash, if any.
    pub fn last_crash_time(&self) -> Option<Timestamp> {
        match self.last_crash_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub(crate) fn set_status(&self, status: WorkerStatus) {
        *self.status.write() = status;
    }

    fn record_crash(&self, now: Timestamp) -> u32 {
        self.last_crash_ms.store(now, Ordering::Relaxed);
        self.crash_count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// =============================================================================
// Worker handle
// =============================================================================

/// Client side of a worker: routes requests and observes status.
pub struct WorkerHandle {
    item_id: ItemId,
    tx: mpsc::Sender<Envelope>,
    state: Arc<WorkerState>,
    request_timeout: Duration,
}

impl WorkerHandle {
    /// The item this worker owns.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Shared status cell.
    pub fn state(&self) -> &Arc<WorkerState> {
        &self.state
    }

    /// Send one request and await its response.
    ///
    /// A missed deadline returns `TIMEOUT` and marks the worker as
    /// potentially crashed; a closed channel returns `WORKER_UNAVAILABLE`.
    pub async fn request(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ExchangeError::WorkerUnavailable(self.item_id.clone()))?;

        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ExchangeError::WorkerUnavailable(self.item_id.clone())),
            Err(_) => {
                self.state.set_status(WorkerStatus::Crashed);
                Err(ExchangeError::Timeout(self.item_id.clone()))
            }
        }
    }
}

/// Spawn a worker actor for an item and return its handle and join handle.
pub(crate) fn spawn_worker(
    item_id: ItemId,
    initial_price: Price,
    params: MarketParams,
    request_timeout: Duration,
) -> (Arc<WorkerHandle>, JoinHandle<()>) {
    let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
    let state = Arc::new(WorkerState::new(item_id.clone()));
    let worker = MarketWorker::new(item_id.clone(), initial_price, params);

    let join = tokio::spawn(run_worker(worker, inbox, Arc::clone(&state)));
    let handle = Arc::new(WorkerHandle {
        item_id,
        tx,
        state,
        request_timeout,
    });
    (handle, join)
}

// =============================================================================
// Worker internals
// =============================================================================

/// The state a worker owns exclusively.
pub(crate) struct MarketWorker {
    item_id: ItemId,
    book: OrderBook,
    engine: PriceEngine,
    /// Accounts of players who have interacted with this item.
    ledger: Ledger,
    /// Unit price reserved per resting buy order, for refunds at settlement
    /// and cancellation.
    reserved: HashMap<OrderId, Price>,
    next_order_id: u64,
    next_seq: u64,
    rng: StdRng,
}

impl MarketWorker {
    pub(crate) fn new(item_id: ItemId, initial_price: Price, params: MarketParams) -> Self {
        Self {
            book: OrderBook::new(item_id.clone()),
            engine: PriceEngine::new(initial_price, params),
            item_id,
            ledger: Ledger::new(),
            reserved: HashMap::new(),
            next_order_id: 1,
            next_seq: 1,
            rng: StdRng::from_os_rng(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_seed(
        item_id: ItemId,
        initial_price: Price,
        params: MarketParams,
        seed: u64,
    ) -> Self {
        let mut worker = Self::new(item_id, initial_price, params);
        worker.rng = StdRng::seed_from_u64(seed);
        worker
    }

    pub(crate) fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Serve one request. Synchronous and CPU-bound; never suspends.
    pub(crate) fn handle(&mut self, request: WorkerRequest) -> Result<WorkerResponse> {
        match request {
            WorkerRequest::Initialize {
                item_id,
                initial_price,
            } => self.handle_initialize(item_id, initial_price),
            WorkerRequest::Submit {
                order,
                starting_balance,
            } => self.handle_submit(order, starting_balance),
            WorkerRequest::Cancel { order_id } => self.handle_cancel(order_id),
            WorkerRequest::GetOrderBook => Ok(WorkerResponse::OrderBook {
                bids: self.book.bids(),
                asks: self.book.asks(),
            }),
            WorkerRequest::GetMarket => Ok(WorkerResponse::Market(MarketOverview {
                item_id: self.item_id.clone(),
                current_price: self.engine.current_price(),
                best_bid: self.book.best_bid(),
                best_ask: self.book.best_ask(),
                volatility: self.engine.params().volatility,
            })),
            WorkerRequest::GetAccount { player_id } => Ok(WorkerResponse::Account(
                self.ledger.get(player_id).map(Account::snapshot),
            )),
            WorkerRequest::GrantInventory {
                player_id,
                quantity,
                starting_balance,
            } => {
                self.ledger.create(player_id, starting_balance);
                if let Some(account) = self.ledger.account_mut(player_id) {
                    account.add_inventory(self.item_id.as_str(), quantity);
                }
                Ok(WorkerResponse::Acknowledged)
            }
            WorkerRequest::Tick => self.handle_tick(),
            WorkerRequest::InjectFault => panic!("injected fault"),
            // Handled by the actor loop, never reaches here.
            WorkerRequest::Shutdown => Ok(WorkerResponse::Acknowledged),
        }
    }

    fn handle_initialize(&mut self, item_id: ItemId, initial_price: Price) -> Result<WorkerResponse> {
        if item_id != self.item_id {
            return Err(ExchangeError::Invariant(format!(
                "initialize for {} routed to worker for {}",
                item_id, self.item_id
            )));
        }
        let params = self.engine.params().clone();
        self.book = OrderBook::new(self.item_id.clone());
        self.engine = PriceEngine::new(initial_price, params);
        self.ledger = Ledger::new();
        self.reserved.clear();
        debug!(item = %self.item_id, price = %initial_price, "market initialized");
        Ok(WorkerResponse::Acknowledged)
    }

    fn handle_submit(&mut self, mut order: Order, starting_balance: Cash) -> Result<WorkerResponse> {
        if order.item_id != self.item_id {
            // Routing never forwards to the wrong worker; this is a bug.
            return Err(ExchangeError::Invariant(format!(
                "order for {} routed to worker for {}",
                order.item_id, self.item_id
            )));
        }
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

        order.id = OrderId(self.next_order_id);
        order.seq = self.next_seq;
        order.timestamp = now_millis();
        order.remaining_quantity = order.quantity;
        order.status = types::OrderStatus::Pending;

        // First contact with this item creates the player's slice.
        self.ledger.create(order.player_id, starting_balance);

        // Reserve before the order can rest. A market buy has no limit, so
        // it reserves at the engine's current price; that unit price is
        // remembered for refunds.
        let unit = order
            .limit_price()
            .unwrap_or_else(|| self.engine.current_price());
        let account = self
            .ledger
            .account_mut(order.player_id)
            .ok_or(ExchangeError::UnknownPlayer(order.player_id))?;
        match order.side {
            OrderSide::Buy => {
                account.withdraw(unit * order.quantity)?;
                self.reserved.insert(order.id, unit);
            }
            OrderSide::Sell => {
                account.remove_inventory(&self.item_id, order.quantity)?;
            }
        }

        if let Err(err) = self.book.add(order.clone()) {
            // The book rejected the order; hand the reservation back.
            if let Some(account) = self.ledger.account_mut(order.player_id) {
                match order.side {
                    OrderSide::Buy => {
                        self.reserved.remove(&order.id);
                        account.deposit(unit * order.quantity);
                    }
                    OrderSide::Sell => {
                        account.add_inventory(self.item_id.as_str(), order.quantity);
                    }
                }
            }
            return Err(err.into());
        }

        self.next_order_id += 1;
        self.next_seq += 1;
        self.engine
            .record_order(order.side, order.quantity, order.timestamp);
        debug!(item = %self.item_id, order = %order.id, side = %order.side, "order resting");
        Ok(WorkerResponse::OrderSubmitted { order_id: order.id })
    }

    fn handle_cancel(&mut self, order_id: OrderId) -> Result<WorkerResponse> {
        let order = self
            .book
            .remove(order_id)?
            .ok_or(ExchangeError::UnknownOrder(order_id))?;

        let refund_unit = match order.side {
            OrderSide::Buy => Some(
                self.reserved
                    .remove(&order_id)
                    .or_else(|| order.limit_price())
                    .unwrap_or_else(|| self.engine.current_price()),
            ),
            OrderSide::Sell => None,
        };
        match self.ledger.account_mut(order.player_id) {
            Some(account) => match refund_unit {
                Some(unit) => account.deposit(unit * order.remaining_quantity),
                None => account.add_inventory(self.item_id.as_str(), order.remaining_quantity),
            },
            None => {
                warn!(item = %self.item_id, order = %order_id, "no ledger slice for refund")
            }
        }
        debug!(item = %self.item_id, order = %order_id, "order cancelled");
        Ok(WorkerResponse::OrderCancelled { order_id })
    }

    fn handle_tick(&mut self) -> Result<WorkerResponse> {
        let now = now_millis();
        let current_price = self.engine.tick(now, &mut self.rng);
        let trades = self.book.match_orders(now)?;

        for trade in &trades {
            self.settle(trade);
        }
        // Reservations of fully filled buys are spent.
        for trade in &trades {
            if self.book.get(trade.buy_order_id).is_none() {
                self.reserved.remove(&trade.buy_order_id);
            }
        }

        Ok(WorkerResponse::TickCompleted {
            trades: trades.to_vec(),
            current_price,
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
        })
    }

    /// Move value for one trade: item to the buyer, cash to the seller, and
    /// reconcile the buyer's reservation against the actual trade price.
    fn settle(&mut self, trade: &Trade) {
        let value = trade.value();

        match self.ledger.account_mut(trade.seller_id) {
            Some(seller) => seller.deposit(value),
            None => warn!(item = %self.item_id, trade = %trade.id, "seller slice missing"),
        }
        match self.ledger.account_mut(trade.buyer_id) {
            Some(buyer) => buyer.add_inventory(self.item_id.as_str(), trade.quantity),
            None => warn!(item = %self.item_id, trade = %trade.id, "buyer slice missing"),
        }

        if let Some(&unit) = self.reserved.get(&trade.buy_order_id) {
            let reserved_value = unit * trade.quantity;
            let Some(buyer) = self.ledger.account_mut(trade.buyer_id) else {
                return;
            };
            if reserved_value > value {
                buyer.deposit(reserved_value - value);
            } else if reserved_value < value {
                // A market buy filled above its reserve price. Take what the
                // balance allows; the trade itself is never unwound.
                let shortfall = value - reserved_value;
                if buyer.withdraw(shortfall).is_err() {
                    let available = buyer.balance();
                    let _ = buyer.withdraw(available);
                    warn!(
                        item = %self.item_id,
                        trade = %trade.id,
                        %shortfall,
                        "market buy under-reserved; shortfall absorbed"
                    );
                }
            }
        }
    }
}

// =============================================================================
// Actor loop
// =============================================================================

async fn run_worker(
    mut worker: MarketWorker,
    mut inbox: mpsc::Receiver<Envelope>,
    state: Arc<WorkerState>,
) {
    while let Some(Envelope { request, reply }) = inbox.recv().await {
        if matches!(request, WorkerRequest::Shutdown) {
            state.set_status(WorkerStatus::Stopped);
            let _ = reply.send(Ok(WorkerResponse::Acknowledged));
            debug!(item = %worker.item_id(), "market worker stopped");
            return;
        }
        if state.status() == WorkerStatus::Stopping {
            let _ = reply.send(Err(ExchangeError::WorkerUnavailable(
                worker.item_id().to_string(),
            )));
            continue;
        }

        // A panic and a typed invariant failure both mean the worker's state
        // can no longer be trusted; only the reply differs.
        let (result, faulted) = match catch_unwind(AssertUnwindSafe(|| worker.handle(request))) {
            Ok(result) => {
                let faulted = matches!(result, Err(ExchangeError::Invariant(_)));
                (result, faulted)
            }
            Err(_) => (
                Err(ExchangeError::WorkerUnavailable(
                    worker.item_id().to_string(),
                )),
                true,
            ),
        };
        let _ = reply.send(result);

        if !faulted {
            if state.status() != WorkerStatus::Running {
                state.set_status(WorkerStatus::Running);
            }
            continue;
        }

        let count = state.record_crash(now_millis());
        state.set_status(WorkerStatus::Crashed);
        error!(
            item = %worker.item_id(),
            crash_count = count,
            "market worker faulted; backing off before restart"
        );

        // min(100ms * 2^n, 10s), n = crashes before this one.
        let exp = count.saturating_sub(1).min(16);
        let backoff = Duration::from_millis((100u64 << exp).min(10_000));
        let deadline = Instant::now() + backoff;

        loop {
            match timeout_at(deadline, inbox.recv()).await {
                Ok(Some(env)) => {
                    if matches!(env.request, WorkerRequest::Shutdown) {
                        state.set_status(WorkerStatus::Stopped);
                        let _ = env.reply.send(Ok(WorkerResponse::Acknowledged));
                        return;
                    }
                    let _ = env.reply.send(Err(ExchangeError::WorkerUnavailable(
                        worker.item_id().to_string(),
                    )));
                }
                Ok(None) => {
                    state.set_status(WorkerStatus::Stopped);
                    return;
                }
                Err(_) => break,
            }
        }

        // Book, engine, and ledger survive the crash; nothing is wiped.
        state.set_status(WorkerStatus::Starting);
        info!(item = %worker.item_id(), "market worker restarted");
    }
    state.set_status(WorkerStatus::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::OrderStatus;

    const FUNDS: f64 = 100_000.0;

    fn worker() -> MarketWorker {
        MarketWorker::with_seed(
            "BTC".to_string(),
            Price::from_float(50_000.0),
            MarketParams::default().with_volatility(0.0).with_drift(0.0),
            7,
        )
    }

    fn submit_funded(
        worker: &mut MarketWorker,
        player: PlayerId,
        side: OrderSide,
        price: f64,
        quantity: f64,
        funds: f64,
    ) -> Result<OrderId> {
        let order = Order::limit(
            player,
            "BTC",
            side,
            Price::from_float(price),
            Quantity::from_float(quantity),
        );
        match worker.handle(WorkerRequest::Submit {
            order,
            starting_balance: Cash::from_float(funds),
        })? {
            WorkerResponse::OrderSubmitted { order_id } => Ok(order_id),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    fn submit_limit(
        worker: &mut MarketWorker,
        player: PlayerId,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> Result<OrderId> {
        submit_funded(worker, player, side, price, quantity, FUNDS)
    }

    fn grant(worker: &mut MarketWorker, player: PlayerId, quantity: f64) {
        worker
            .handle(WorkerRequest::GrantInventory {
                player_id: player,
                quantity: Quantity::from_float(quantity),
                starting_balance: Cash::from_float(FUNDS),
            })
            .unwrap();
    }

    fn account(worker: &mut MarketWorker, player: PlayerId) -> Account {
        match worker
            .handle(WorkerRequest::GetAccount { player_id: player })
            .unwrap()
        {
            WorkerResponse::Account(Some(account)) => account,
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_submit_reserves_buy_funds() {
        let mut worker = worker();
        let player = PlayerId(1);

        submit_limit(&mut worker, player, OrderSide::Buy, 100.0, 5.0).unwrap();

        // 100 * 5 = 500 reserved
        assert_eq!(
            account(&mut worker, player).balance(),
            Cash::from_float(99_500.0)
        );
    }

    #[test]
    fn test_unknown_player_has_no_slice() {
        let mut worker = worker();
        match worker
            .handle(WorkerRequest::GetAccount {
                player_id: PlayerId(9),
            })
            .unwrap()
        {
            WorkerResponse::Account(None) => {}
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_submit_rejects_insufficient_funds() {
        let mut worker = worker();
        let poor = PlayerId(2);

        let err = submit_funded(&mut worker, poor, OrderSide::Buy, 100.0, 5.0, 10.0).unwrap_err();
        assert_eq!(err.kind(), "INSUFFICIENT_FUNDS");

        // Book untouched, slice balance unchanged.
        assert_eq!(account(&mut worker, poor).balance(), Cash::from_float(10.0));
        match worker.handle(WorkerRequest::GetOrderBook).unwrap() {
            WorkerResponse::OrderBook { bids, asks } => {
                assert!(bids.is_empty());
                assert!(asks.is_empty());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_submit_rejects_seller_without_inventory() {
        let mut worker = worker();

        let err = submit_limit(&mut worker, PlayerId(1), OrderSide::Sell, 100.0, 1.0).unwrap_err();
        assert_eq!(err.kind(), "INSUFFICIENT_INVENTORY");
    }

    #[test]
    fn test_cancel_refunds_reserved_balance() {
        let mut worker = worker();
        let player = PlayerId(1);

        let order_id = submit_limit(&mut worker, player, OrderSide::Buy, 100.0, 5.0).unwrap();
        assert_eq!(
            account(&mut worker, player).balance(),
            Cash::from_float(99_500.0)
        );

        worker.handle(WorkerRequest::Cancel { order_id }).unwrap();
        assert_eq!(
            account(&mut worker, player).balance(),
            Cash::from_float(100_000.0)
        );
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut worker = worker();
        let err = worker
            .handle(WorkerRequest::Cancel {
                order_id: OrderId(99),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_ORDER");
    }

    #[test]
    fn test_tick_settles_both_sides() {
        let mut worker = worker();
        let buyer = PlayerId(1);
        let seller = PlayerId(2);
        grant(&mut worker, seller, 2.0);

        submit_limit(&mut worker, buyer, OrderSide::Buy, 50_000.0, 1.5).unwrap();
        submit_limit(&mut worker, seller, OrderSide::Sell, 49_900.0, 1.5).unwrap();

        let response = worker.handle(WorkerRequest::Tick).unwrap();
        let trades = match response {
            WorkerResponse::TickCompleted { trades, .. } => trades,
            other => panic!("unexpected response: {:?}", other),
        };

        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.price, Price::from_float(49_900.0));
        assert_eq!(trade.quantity, Quantity::from_float(1.5));

        // Buyer reserved at 50,000 but traded at 49,900: difference refunded.
        // 100,000 - 49,900 * 1.5 = 25,150.
        let buyer_account = account(&mut worker, buyer);
        assert_eq!(buyer_account.balance(), Cash::from_float(25_150.0));
        assert_eq!(buyer_account.inventory("BTC"), Quantity::from_float(1.5));

        // Seller keeps 0.5 BTC and gains the proceeds.
        let seller_account = account(&mut worker, seller);
        assert_eq!(
            seller_account.balance(),
            Cash::from_float(100_000.0 + 74_850.0)
        );
        assert_eq!(seller_account.inventory("BTC"), Quantity::from_float(0.5));
    }

    #[test]
    fn test_partial_fill_then_cancel_refunds_remainder() {
        let mut worker = worker();
        let buyer = PlayerId(1);
        let seller = PlayerId(2);
        grant(&mut worker, seller, 100.0);

        let bid = submit_limit(&mut worker, buyer, OrderSide::Buy, 55.0, 150.0).unwrap();
        submit_limit(&mut worker, seller, OrderSide::Sell, 50.0, 100.0).unwrap();

        worker.handle(WorkerRequest::Tick).unwrap();

        // 150 * 55 reserved = 8,250; 100 traded at 50 = 5,000, refund 500.
        // Remaining balance: 100,000 - 8,250 + 500 = 92,250.
        assert_eq!(
            account(&mut worker, buyer).balance(),
            Cash::from_float(92_250.0)
        );

        // Cancelling the remainder refunds 50 * 55 = 2,750.
        worker.handle(WorkerRequest::Cancel { order_id: bid }).unwrap();
        assert_eq!(
            account(&mut worker, buyer).balance(),
            Cash::from_float(95_000.0)
        );
    }

    #[test]
    fn test_fully_filled_then_cancel_is_unknown() {
        let mut worker = worker();
        let buyer = PlayerId(1);
        let seller = PlayerId(2);
        grant(&mut worker, seller, 1.0);

        let bid = submit_limit(&mut worker, buyer, OrderSide::Buy, 100.0, 1.0).unwrap();
        submit_limit(&mut worker, seller, OrderSide::Sell, 100.0, 1.0).unwrap();
        worker.handle(WorkerRequest::Tick).unwrap();

        let err = worker
            .handle(WorkerRequest::Cancel { order_id: bid })
            .unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_ORDER");
    }

    #[test]
    fn test_market_buy_reserves_at_engine_price() {
        let mut worker = worker();
        let player = PlayerId(1);

        let order = Order::market(player, "BTC", OrderSide::Buy, Quantity::from_float(1.0));
        worker
            .handle(WorkerRequest::Submit {
                order,
                starting_balance: Cash::from_float(FUNDS),
            })
            .unwrap();

        // Engine price is 50,000 with zero drift/volatility.
        assert_eq!(
            account(&mut worker, player).balance(),
            Cash::from_float(50_000.0)
        );
    }

    #[test]
    fn test_misrouted_order_is_invariant() {
        let mut worker = worker();
        let order = Order::limit(
            PlayerId(1),
            "GOLD",
            OrderSide::Buy,
            Price::from_float(10.0),
            Quantity::from_float(1.0),
        );
        let err = worker
            .handle(WorkerRequest::Submit {
                order,
                starting_balance: Cash::from_float(FUNDS),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "INVARIANT");
    }

    #[test]
    fn test_get_market_overview() {
        let mut worker = worker();
        submit_limit(&mut worker, PlayerId(1), OrderSide::Buy, 49_000.0, 1.0).unwrap();

        match worker.handle(WorkerRequest::GetMarket).unwrap() {
            WorkerResponse::Market(overview) => {
                assert_eq!(overview.item_id, "BTC");
                assert_eq!(overview.current_price, Price::from_float(50_000.0));
                assert_eq!(overview.best_bid, Some(Price::from_float(49_000.0)));
                assert_eq!(overview.best_ask, None);
                assert_eq!(overview.volatility, 0.0);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_order_statuses_progress() {
        let mut worker = worker();
        let buyer = PlayerId(1);
        let seller = PlayerId(2);
        grant(&mut worker, seller, 10.0);

        let bid = submit_limit(&mut worker, buyer, OrderSide::Buy, 100.0, 10.0).unwrap();
        submit_limit(&mut worker, seller, OrderSide::Sell, 100.0, 4.0).unwrap();
        worker.handle(WorkerRequest::Tick).unwrap();

        match worker.handle(WorkerRequest::GetOrderBook).unwrap() {
            WorkerResponse::OrderBook { bids, .. } => {
                assert_eq!(bids.len(), 1);
                assert_eq!(bids[0].id, bid);
                assert_eq!(
                    bids[0].status,
                    OrderStatus::Partial {
                        filled: Quantity::from_float(4.0)
                    }
                );
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
