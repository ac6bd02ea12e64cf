//! Trade types for the trading arena.
//!
//! A trade records one execution between a resting bid and a resting ask.
//! Trades are immutable once emitted by the matcher; the engine never stores
//! them.

use crate::ids::{ItemId, OrderId, PlayerId, Timestamp, TradeId};
use crate::money::{Cash, Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A completed trade between two orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier (monotonic per worker).
    pub id: TradeId,
    /// Item traded.
    pub item_id: ItemId,
    /// Order on the buy side.
    pub buy_order_id: OrderId,
    /// Order on the sell side.
    pub sell_order_id: OrderId,
    /// Player who bought.
    pub buyer_id: PlayerId,
    /// Player who sold.
    pub seller_id: PlayerId,
    /// Execution price.
    pub price: Price,
    /// Quantity traded.
    pub quantity: Quantity,
    /// When the trade occurred (wall clock, ms).
    pub timestamp: Timestamp,
}

impl Trade {
    /// Calculate the total cash value of this trade.
    pub fn value(&self) -> Cash {
        self.price * self.quantity
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade[{}]: {} {} @ {} (buyer: {}, seller: {})",
            self.id, self.item_id, self.quantity, self.price, self.buyer_id, self.seller_id
        )
    }
}
