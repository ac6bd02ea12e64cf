//! Per-subscriber market update stream.
//!
//! A feed wraps a broadcast receiver. On attach it carries one `Init` event
//! per live item, then yields live updates. A slow subscriber does not slow
//! the bus: events it failed to keep up with are dropped oldest-first and
//! counted on the feed. Dropping the feed deregisters it silently.

use std::collections::VecDeque;

use tokio::sync::broadcast;
use types::MarketUpdate;

/// Subscriber end of the market update bus.
pub struct MarketFeed {
    /// Init events delivered before any live update.
    pending: VecDeque<MarketUpdate>,
    rx: broadcast::Receiver<MarketUpdate>,
    /// Events lost to lag so far.
    dropped: u64,
}

impl MarketFeed {
    pub(crate) fn new(inits: Vec<MarketUpdate>, rx: broadcast::Receiver<MarketUpdate>) -> Self {
        Self {
            pending: inits.into(),
            rx,
            dropped: 0,
        }
    }

    /// Next update; suspends until one arrives.
    ///
    /// Returns `None` once the bus is gone (exchange shut down).
    pub async fn recv(&mut self) -> Option<MarketUpdate> {
        if let Some(update) = self.pending.pop_front() {
            return Some(update);
        }
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Oldest events were dropped for this subscriber; the
                    // stream continues from the earliest retained one.
                    self.dropped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant: `None` when no update is ready.
    pub fn try_recv(&mut self) -> Option<MarketUpdate> {
        if let Some(update) = self.pending.pop_front() {
            return Some(update);
        }
        loop {
            match self.rx.try_recv() {
                Ok(update) => return Some(update),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    self.dropped += n;
                }
                Err(_) => return None,
            }
        }
    }

    /// Events this subscriber lost to lag.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Price, UpdateKind};

    fn update(kind: UpdateKind, price: f64) -> MarketUpdate {
        MarketUpdate {
            kind,
            item_id: "BTC".to_string(),
            current_price: Price::from_float(price),
            best_bid: None,
            best_ask: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_init_events_come_first() {
        let (tx, rx) = broadcast::channel(8);
        let mut feed = MarketFeed::new(vec![update(UpdateKind::Init, 100.0)], rx);

        tx.send(update(UpdateKind::Price, 101.0)).unwrap();

        assert_eq!(feed.recv().await.unwrap().kind, UpdateKind::Init);
        assert_eq!(feed.recv().await.unwrap().kind, UpdateKind::Price);
    }

    #[tokio::test]
    async fn test_lag_drops_oldest_and_counts() {
        let (tx, rx) = broadcast::channel(2);
        let mut feed = MarketFeed::new(Vec::new(), rx);

        for i in 0..5 {
            tx.send(update(UpdateKind::Price, 100.0 + i as f64)).unwrap();
        }

        // Capacity 2: events 0..3 were dropped, 3 and 4 remain.
        let first = feed.recv().await.unwrap();
        assert_eq!(first.current_price, Price::from_float(103.0));
        assert_eq!(feed.dropped(), 3);

        let second = feed.recv().await.unwrap();
        assert_eq!(second.current_price, Price::from_float(104.0));
    }

    #[tokio::test]
    async fn test_closed_bus_ends_stream() {
        let (tx, rx) = broadcast::channel(2);
        let mut feed = MarketFeed::new(Vec::new(), rx);
        drop(tx);

        assert!(feed.recv().await.is_none());
    }
}
