//! Core identifier types for the trading arena.
//!
//! This module defines the fundamental ID types used throughout the system
//! to uniquely identify orders, players, trades, and tradable items.

use derive_more::{Add, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Fixed-point scale factor: 10,000 means 4 decimal places.
/// - `10000` = $1.00
/// - `1` = $0.0001 (smallest increment)
///
/// Prices, cash balances, and quantities all share this scale so fractional
/// order sizes (e.g. 1.5 units) are exact.
pub const PRICE_SCALE: i64 = 10_000;

// =============================================================================
// Core ID Types
// =============================================================================

/// Unique identifier for an order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    From,
    Into,
)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order#{}", self.0)
    }
}

/// Unique identifier for a player session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    From,
    Into,
)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player#{}", self.0)
    }
}

/// Unique identifier for a completed trade (monotonic per market worker).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    From,
    Into,
)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trade#{}", self.0)
    }
}

// =============================================================================
// Item Type
// =============================================================================

/// Tradable item identifier (e.g., "BTC", "GOLD").
pub type ItemId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Wall clock timestamp in milliseconds since epoch.
pub type Timestamp = u64;
