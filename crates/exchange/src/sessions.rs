//! Player session issuance.
//!
//! The directory is dispatcher-tier state: it issues player ids and records
//! each session's funding. It never holds balances or inventories — those
//! live in the ledger slice each market worker owns exclusively, created on
//! the player's first contact with that worker and funded with the amount
//! recorded here. Workers never touch the directory; its content travels to
//! them inside request envelopes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use types::{Cash, PlayerId};

use crate::error::{ExchangeError, Result};

/// Registry of live player sessions and their funding.
#[derive(Clone)]
pub struct SessionDirectory {
    inner: Arc<Inner>,
}

struct Inner {
    next_player_id: AtomicU64,
    players: RwLock<HashMap<PlayerId, Cash>>,
    default_balance: Cash,
}

impl SessionDirectory {
    /// Create an empty directory.
    pub fn new(default_balance: Cash) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_player_id: AtomicU64::new(1),
                players: RwLock::new(HashMap::new()),
                default_balance,
            }),
        }
    }

    /// Issue a new player session funded with the given amount (or the
    /// default).
    pub fn create_session(&self, initial_balance: Option<Cash>) -> PlayerId {
        let player_id = PlayerId(self.inner.next_player_id.fetch_add(1, Ordering::Relaxed));
        let balance = initial_balance.unwrap_or(self.inner.default_balance);
        self.inner.players.write().insert(player_id, balance);
        player_id
    }

    /// Remove a player session (explicit session cleanup).
    pub fn end_session(&self, player_id: PlayerId) -> Result<()> {
        self.inner
            .players
            .write()
            .remove(&player_id)
            .map(|_| ())
            .ok_or(ExchangeError::UnknownPlayer(player_id))
    }

    /// Whether the player has a live session.
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.inner.players.read().contains_key(&player_id)
    }

    /// The funding recorded for a session.
    pub fn starting_balance(&self, player_id: PlayerId) -> Option<Cash> {
        self.inner.players.read().get(&player_id).copied()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.players.read().len()
    }
}
