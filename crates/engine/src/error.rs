//! Error types for the market core.

use std::fmt;
use types::{Cash, ItemId, OrderId, PlayerId, Quantity};

/// Result type for market core operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Errors that can occur when placing or removing orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Limit orders must carry a price.
    MissingLimitPrice,
    /// Order quantity must be strictly positive.
    ZeroQuantity,
    /// Limit order price must be positive.
    InvalidPrice,
    /// An order with this id is already in the book.
    DuplicateOrder(OrderId),
    /// Internal inconsistency between heap and index.
    Invariant(String),
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::MissingLimitPrice => write!(f, "limit order requires a price"),
            BookError::ZeroQuantity => write!(f, "order quantity must be positive"),
            BookError::InvalidPrice => write!(f, "limit order price must be positive"),
            BookError::DuplicateOrder(id) => write!(f, "order {} is already in the book", id),
            BookError::Invariant(msg) => write!(f, "order book invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for BookError {}

/// Errors from balance or inventory adjustments. State is unchanged on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A withdrawal would drive the balance below zero.
    InsufficientFunds {
        player_id: PlayerId,
        required: Cash,
        available: Cash,
    },
    /// An inventory removal would drive the quantity below zero.
    InsufficientInventory {
        player_id: PlayerId,
        item_id: ItemId,
        required: Quantity,
        available: Quantity,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InsufficientFunds {
                player_id,
                required,
                available,
            } => write!(
                f,
                "{} has insufficient funds: required {}, available {}",
                player_id, required, available
            ),
            LedgerError::InsufficientInventory {
                player_id,
                item_id,
                required,
                available,
            } => write!(
                f,
                "{} has insufficient {}: required {}, available {}",
                player_id, item_id, required, available
            ),
        }
    }
}

impl std::error::Error for LedgerError {}
