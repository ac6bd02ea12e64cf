//! Market data event types for the trading arena.
//!
//! This module contains the payloads broadcast on the update bus and the
//! per-item market overview returned by queries. Payloads are plain
//! serializable data; routing and delivery live in the exchange fabric.

use crate::ids::{ItemId, Timestamp};
use crate::money::Price;
use serde::{Deserialize, Serialize};

// =============================================================================
// Update Bus Events
// =============================================================================

/// What a market update announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// Sent once per subscriber on attach, one per live item.
    Init,
    /// Sent every tick.
    Price,
    /// Accompanies a tick when at least one trade occurred.
    Trade,
}

/// Snapshot event published on the update bus after each tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketUpdate {
    /// What this update announces.
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Item this update is for.
    pub item_id: ItemId,
    /// Reference price after the tick.
    pub current_price: Price,
    /// Best resting bid, if any.
    pub best_bid: Option<Price>,
    /// Best resting ask, if any.
    pub best_ask: Option<Price>,
    /// When the update was produced (wall clock, ms).
    pub timestamp: Timestamp,
}

// =============================================================================
// Market Overview
// =============================================================================

/// Point-in-time view of a single market, returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Item this market trades.
    pub item_id: ItemId,
    /// Current reference price.
    pub current_price: Price,
    /// Best resting bid, if any.
    pub best_bid: Option<Price>,
    /// Best resting ask, if any.
    pub best_ask: Option<Price>,
    /// Configured volatility of the price process.
    pub volatility: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_kind_serializes_lowercase() {
        let update = MarketUpdate {
            kind: UpdateKind::Price,
            item_id: "BTC".to_string(),
            current_price: Price::from_float(50_000.0),
            best_bid: Some(Price::from_float(49_990.0)),
            best_ask: None,
            timestamp: 1_000,
        };

        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"type\":\"price\""));

        let back: MarketUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }
}
