//! Order types for the trading arena.
//!
//! This module defines all order-related types including order sides,
//! order kinds (market/limit), status tracking, and the Order struct itself.

use crate::ids::{ItemId, OrderId, PlayerId, Timestamp};
use crate::money::{Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Order Side
// =============================================================================

/// Which side of the market the order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// Order Kind
// =============================================================================

/// Kind of order determining execution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Execute against best opposing liquidity at whatever price it offers.
    Market,
    /// Execute at the specified price or better.
    Limit { price: Price },
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit { price } => write!(f, "LIMIT@{}", price),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Status of an order in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order accepted and resting, no fills yet.
    #[default]
    Pending,
    /// Order partially filled; the filled amount is tracked.
    Partial { filled: Quantity },
    /// Order completely filled.
    Filled,
    /// Order was cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still rest in the book.
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Partial { .. })
    }
}

// =============================================================================
// Order Struct
// =============================================================================

/// A trading order submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier (assigned by the owning worker, 0 as placeholder).
    pub id: OrderId,
    /// Player who submitted the order.
    pub player_id: PlayerId,
    /// Item being traded.
    pub item_id: ItemId,
    /// Buy or Sell.
    pub side: OrderSide,
    /// Market or Limit order.
    pub kind: OrderKind,
    /// Total quantity requested.
    pub quantity: Quantity,
    /// Remaining quantity (for partial fills).
    pub remaining_quantity: Quantity,
    /// When the order arrived (wall clock, ms).
    pub timestamp: Timestamp,
    /// Per-worker arrival sequence; the stable FIFO tie-break.
    pub seq: u64,
    /// Current status.
    pub status: OrderStatus,
}

impl Order {
    /// Create a new limit order.
    pub fn limit(
        player_id: PlayerId,
        item_id: impl Into<ItemId>,
        side: OrderSide,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id: OrderId(0), // Placeholder, assigned by the worker
            player_id,
            item_id: item_id.into(),
            side,
            kind: OrderKind::Limit { price },
            quantity,
            remaining_quantity: quantity,
            timestamp: 0,
            seq: 0,
            status: OrderStatus::Pending,
        }
    }

    /// Create a new market order.
    pub fn market(
        player_id: PlayerId,
        item_id: impl Into<ItemId>,
        side: OrderSide,
        quantity: Quantity,
    ) -> Self {
        Self {
            id: OrderId(0),
            player_id,
            item_id: item_id.into(),
            side,
            kind: OrderKind::Market,
            quantity,
            remaining_quantity: quantity,
            timestamp: 0,
            seq: 0,
            status: OrderStatus::Pending,
        }
    }

    /// Get the limit price if this is a limit order.
    pub fn limit_price(&self) -> Option<Price> {
        match self.kind {
            OrderKind::Limit { price } => Some(price),
            OrderKind::Market => None,
        }
    }

    /// Quantity filled so far.
    pub fn filled_quantity(&self) -> Quantity {
        self.quantity.saturating_sub(self.remaining_quantity)
    }

    /// Check if order is fully filled.
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    /// Check if order is a buy order.
    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }

    /// Check if order is a sell order.
    pub fn is_sell(&self) -> bool {
        self.side == OrderSide::Sell
    }
}
