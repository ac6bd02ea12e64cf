//! Player balances and inventories.
//!
//! Adjustments are try-apply: any operation that would drive a balance or an
//! inventory quantity below zero fails and leaves state unchanged. Items with
//! zero quantity are purged from the inventory mapping. Snapshots are deep
//! copies; a caller cannot mutate engine state through one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use types::{Cash, ItemId, PlayerId, Quantity};

use crate::error::LedgerError;

// =============================================================================
// Account
// =============================================================================

/// One player's balance and per-item inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The player this account belongs to.
    pub player_id: PlayerId,
    /// Cash balance, never negative.
    balance: Cash,
    /// Item holdings; an item with zero quantity is absent.
    inventory: HashMap<ItemId, Quantity>,
}

impl Account {
    /// Create a new account with a starting balance.
    pub fn new(player_id: PlayerId, starting_balance: Cash) -> Self {
        Self {
            player_id,
            balance: starting_balance,
            inventory: HashMap::new(),
        }
    }

    /// Current balance.
    pub fn balance(&self) -> Cash {
        self.balance
    }

    /// Quantity held of an item (zero if absent).
    pub fn inventory(&self, item_id: &str) -> Quantity {
        self.inventory.get(item_id).copied().unwrap_or(Quantity::ZERO)
    }

    /// All holdings.
    pub fn holdings(&self) -> &HashMap<ItemId, Quantity> {
        &self.inventory
    }

    /// Whether the balance covers an amount.
    pub fn has_balance(&self, amount: Cash) -> bool {
        self.balance >= amount
    }

    /// Whether the inventory covers a quantity of an item.
    pub fn has_inventory(&self, item_id: &str, quantity: Quantity) -> bool {
        self.inventory(item_id) >= quantity
    }

    /// Credit the balance.
    pub fn deposit(&mut self, amount: Cash) {
        self.balance += amount;
    }

    /// Debit the balance. Fails without touching state if it would go negative.
    pub fn withdraw(&mut self, amount: Cash) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                player_id: self.player_id,
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Credit inventory of an item.
    pub fn add_inventory(&mut self, item_id: impl Into<ItemId>, quantity: Quantity) {
        if quantity.is_zero() {
            return;
        }
        *self.inventory.entry(item_id.into()).or_insert(Quantity::ZERO) += quantity;
    }

    /// Debit inventory of an item. Fails without touching state if it would
    /// go negative; purges the entry when it reaches zero.
    pub fn remove_inventory(
        &mut self,
        item_id: &str,
        quantity: Quantity,
    ) -> Result<(), LedgerError> {
        let available = self.inventory(item_id);
        if available < quantity {
            return Err(LedgerError::InsufficientInventory {
                player_id: self.player_id,
                item_id: item_id.to_string(),
                required: quantity,
                available,
            });
        }
        let remaining = available - quantity;
        if remaining.is_zero() {
            self.inventory.remove(item_id);
        } else {
            self.inventory.insert(item_id.to_string(), remaining);
        }
        Ok(())
    }

    /// Deep copy of this account.
    pub fn snapshot(&self) -> Account {
        self.clone()
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Registry of player accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<PlayerId, Account>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account for a player. No-op if one already exists.
    pub fn create(&mut self, player_id: PlayerId, starting_balance: Cash) {
        self.accounts
            .entry(player_id)
            .or_insert_with(|| Account::new(player_id, starting_balance));
    }

    /// Whether a player has an account.
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.accounts.contains_key(&player_id)
    }

    /// Read access to an account.
    pub fn get(&self, player_id: PlayerId) -> Option<&Account> {
        self.accounts.get(&player_id)
    }

    /// Mutable access to an account.
    pub fn account_mut(&mut self, player_id: PlayerId) -> Option<&mut Account> {
        self.accounts.get_mut(&player_id)
    }

    /// Remove an account (explicit session cleanup).
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Account> {
        self.accounts.remove(&player_id)
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Deep copy of the whole ledger.
    pub fn snapshot(&self) -> Ledger {
        self.clone()
    }

    /// Replace state from a snapshot.
    pub fn restore(&mut self, snapshot: Ledger) {
        *self = snapshot;
    }
}
