//! Error taxonomy for the exchange fabric.
//!
//! Every failure a caller can observe is one of these tagged values; no
//! panics or stack traces cross the facade boundary. Matching and pricing
//! never fail visibly — failures are localized to request handlers and
//! surfaced through responses.

use engine::{BookError, LedgerError};
use thiserror::Error;
use types::{Cash, ItemId, OrderId, PlayerId, Quantity};

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors surfaced by the exchange fabric.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// No worker owns this item; recoverable by spawning one.
    #[error("no market for {0}")]
    NoWorker(ItemId),

    /// The worker is crashed or stopping; the caller may retry.
    #[error("market for {0} is unavailable")]
    WorkerUnavailable(ItemId),

    /// The worker did not respond within the per-request budget.
    #[error("request to market for {0} timed out")]
    Timeout(ItemId),

    /// The bounded task queue is full; slow down or retry.
    #[error("task queue is full")]
    Backpressure,

    /// Malformed request (missing price on limit, non-positive quantity, ...).
    #[error("invalid order: {0}")]
    Validation(String),

    /// No session exists for this player.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A balance debit would go negative; state unchanged.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Cash, available: Cash },

    /// An inventory debit would go negative; state unchanged.
    #[error("insufficient {item_id}: required {required}, available {available}")]
    InsufficientInventory {
        item_id: ItemId,
        required: Quantity,
        available: Quantity,
    },

    /// Cancel or lookup for an id that is not resting.
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    /// Internal inconsistency; crashes the offending worker.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ExchangeError {
    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::NoWorker(_) => "NO_WORKER",
            ExchangeError::WorkerUnavailable(_) => "WORKER_UNAVAILABLE",
            ExchangeError::Timeout(_) => "TIMEOUT",
            ExchangeError::Backpressure => "BACKPRESSURE",
            ExchangeError::Validation(_) => "VALIDATION",
            ExchangeError::UnknownPlayer(_) => "VALIDATION",
            ExchangeError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ExchangeError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            ExchangeError::UnknownOrder(_) => "UNKNOWN_ORDER",
            ExchangeError::Invariant(_) => "INVARIANT",
        }
    }

    /// Whether a queued task may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::WorkerUnavailable(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::Backpressure
        )
    }
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required, available, ..
            } => ExchangeError::InsufficientFunds {
                required,
                available,
            },
            LedgerError::InsufficientInventory {
                item_id,
                required,
                available,
                ..
            } => ExchangeError::InsufficientInventory {
                item_id,
                required,
                available,
            },
        }
    }
}

impl From<BookError> for ExchangeError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Invariant(msg) => ExchangeError::Invariant(msg),
            other => ExchangeError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(ExchangeError::Backpressure.kind(), "BACKPRESSURE");
        assert_eq!(ExchangeError::NoWorker("BTC".into()).kind(), "NO_WORKER");
        assert_eq!(
            ExchangeError::UnknownOrder(OrderId(7)).kind(),
            "UNKNOWN_ORDER"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ExchangeError::Backpressure.is_retryable());
        assert!(ExchangeError::Timeout("X".into()).is_retryable());
        assert!(!ExchangeError::Validation("bad".into()).is_retryable());
        assert!(!ExchangeError::InsufficientFunds {
            required: Cash::from_float(1.0),
            available: Cash::ZERO,
        }
        .is_retryable());
    }

    #[test]
    fn test_ledger_error_conversion() {
        let err = LedgerError::InsufficientFunds {
            player_id: PlayerId(1),
            required: Cash::from_float(10.0),
            available: Cash::from_float(5.0),
        };
        let converted: ExchangeError = err.into();
        assert_eq!(converted.kind(), "INSUFFICIENT_FUNDS");
    }
}
