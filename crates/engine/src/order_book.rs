//! Double-sided order book with price-time priority matching.
//!
//! The book keeps two [`OrderHeap`]s (bids and asks) plus an id index for
//! O(1) lookup. The heaps are authoritative for ordering, the index for
//! lookup; both are updated together within each operation.
//!
//! Matching is driven by the owning worker on each tick: the loop trades the
//! two roots against each other for as long as they cross. Market orders with
//! no opposing liquidity stay resting and continue to match on later ticks.

use std::collections::HashMap;

use smallvec::SmallVec;
use types::{
    ItemId, Order, OrderId, OrderSide, OrderStatus, Price, Quantity, Timestamp, Trade, TradeId,
};

use crate::error::{BookError, Result};
use crate::heap::OrderHeap;

/// Trades produced by a single matching pass. Usually few.
pub type TradeBatch = SmallVec<[Trade; 4]>;

/// Order book for a single item.
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// The item this book trades.
    item_id: ItemId,
    /// Resting buy orders, highest price at the root.
    bids: OrderHeap,
    /// Resting sell orders, lowest price at the root.
    asks: OrderHeap,
    /// Quick lookup of resting orders by id. Mirrors the heaps exactly.
    index: HashMap<OrderId, Order>,
    /// Counter for generating unique trade ids.
    next_trade_id: u64,
}

impl OrderBook {
    /// Create a new empty order book for an item.
    pub fn new(item_id: impl Into<ItemId>) -> Self {
        Self {
            item_id: item_id.into(),
            bids: OrderHeap::new(OrderSide::Buy),
            asks: OrderHeap::new(OrderSide::Sell),
            index: HashMap::new(),
            next_trade_id: 1,
        }
    }

    /// The item this book is for.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Place an order into the correct heap.
    ///
    /// Rejects market orders carrying no quantity, limit orders without a
    /// positive price, and duplicate ids. Rejection leaves the book unchanged.
    pub fn add(&mut self, order: Order) -> Result<()> {
        if order.remaining_quantity.is_zero() {
            return Err(BookError::ZeroQuantity);
        }
        match order.limit_price() {
            Some(price) if !price.is_positive() => return Err(BookError::InvalidPrice),
            _ => {}
        }
        if self.index.contains_key(&order.id) {
            return Err(BookError::DuplicateOrder(order.id));
        }

        self.index.insert(order.id, order.clone());
        match order.side {
            OrderSide::Buy => self.bids.push(order),
            OrderSide::Sell => self.asks.push(order),
        }
        Ok(())
    }

    /// Remove an order from the book by id.
    ///
    /// Idempotent: returns `Ok(None)` if the order is not resting. A heap
    /// and index that disagree mean the book is corrupt; that surfaces as
    /// an invariant error so the owning worker can be recycled.
    pub fn remove(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let Some(indexed) = self.index.remove(&order_id) else {
            return Ok(None);
        };
        let heap = match indexed.side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        };
        match heap.remove_first(|o| o.id == order_id) {
            Some(order) => Ok(Some(order)),
            None => Err(BookError::Invariant(format!(
                "{} indexed but not in heap",
                order_id
            ))),
        }
    }

    /// Snapshot lookup of a resting order.
    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.index.get(&order_id).cloned()
    }

    /// Price at the bid root, absent if no bids rest or the root is a market order.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.peek().and_then(|o| o.limit_price())
    }

    /// Price at the ask root, absent if no asks rest or the root is a market order.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.peek().and_then(|o| o.limit_price())
    }

    /// Mid price between best bid and best ask, if both sides quote.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Price((bid.raw() + ask.raw()) / 2)),
            _ => None,
        }
    }

    /// Spread between best ask and best bid, if both sides quote.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Resting bids in priority order.
    pub fn bids(&self) -> Vec<Order> {
        self.bids.snapshot()
    }

    /// Resting asks in priority order.
    pub fn asks(&self) -> Vec<Order> {
        self.asks.snapshot()
    }

    /// Total number of resting orders.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the book has no resting orders.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Run the matching loop until no crossing pair remains.
    ///
    /// Each round trades the two roots:
    /// - two limits cross iff `bid.price >= ask.price` and trade at the ask
    ///   price (the resting ask is privileged by convention)
    /// - a market order against a limit trades at the limit's price
    /// - two market orders have no price source and terminate the loop
    ///
    /// Fill quantity is the smaller remaining quantity; the exhausted side is
    /// popped, the survivor is marked partial. Absence of a crossing pair is
    /// the normal terminal state; the only error is a corrupt book, which is
    /// only reachable on a bug.
    pub fn match_orders(&mut self, timestamp: Timestamp) -> Result<TradeBatch> {
        let mut trades = TradeBatch::new();

        loop {
            let (bid, ask) = match (self.bids.peek(), self.asks.peek()) {
                (Some(bid), Some(ask)) => (bid, ask),
                _ => break,
            };

            let price = match (bid.limit_price(), ask.limit_price()) {
                // Two market orders: no reference price available from the
                // book alone, stop.
                (None, None) => break,
                // Market buy against limit ask trades at the ask price.
                (None, Some(ask_price)) => ask_price,
                // Market sell against limit bid trades at the bid price.
                (Some(bid_price), None) => bid_price,
                (Some(bid_price), Some(ask_price)) => {
                    if bid_price < ask_price {
                        break;
                    }
                    ask_price
                }
            };

            let quantity = bid.remaining_quantity.min(ask.remaining_quantity);
            let trade = Trade {
                id: TradeId(self.next_trade_id),
                item_id: self.item_id.clone(),
                buy_order_id: bid.id,
                sell_order_id: ask.id,
                buyer_id: bid.player_id,
                seller_id: ask.player_id,
                price,
                quantity,
                timestamp,
            };
            self.next_trade_id += 1;

            self.fill_root(OrderSide::Buy, quantity)?;
            self.fill_root(OrderSide::Sell, quantity)?;

            trades.push(trade);
        }

        Ok(trades)
    }

    /// Reduce the root of one side by the traded quantity, popping it when
    /// exhausted and keeping the id index in step.
    fn fill_root(&mut self, side: OrderSide, quantity: Quantity) -> Result<()> {
        let heap = match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        };

        let exhausted = match heap.peek_mut() {
            Some(root) => {
                root.remaining_quantity = root.remaining_quantity.saturating_sub(quantity);
                if root.remaining_quantity.is_zero() {
                    root.status = OrderStatus::Filled;
                    true
                } else {
                    root.status = OrderStatus::Partial {
                        filled: root.filled_quantity(),
                    };
                    false
                }
            }
            None => {
                return Err(BookError::Invariant(format!(
                    "fill on empty {} heap",
                    side
                )))
            }
        };

        if exhausted {
            if let Some(filled) = heap.pop() {
                self.index.remove(&filled.id);
            }
        } else if let Some(root) = heap.peek() {
            self.index.insert(root.id, root.clone());
        }
        Ok(())
    }

    /// Verify heap/index agreement. Only reachable on a bug.
    #[cfg(test)]
    fn check_invariants(&self) {
        assert_eq!(self.index.len(), self.bids.len() + self.asks.len());
        for order in self.bids.iter().chain(self.asks.iter()) {
            assert!(self.index.contains_key(&order.id));
            assert!(!order.remaining_quantity.is_zero());
            assert!(order.status.is_active());
        }
    }
}
