//! Single-threaded market core for the trading arena.
//!
//! This crate contains everything one market worker owns exclusively:
//!
//! - [`heap`]: side-aware binary heap with price-time priority
//! - [`order_book`]: double-sided book with an id index and the matching loop
//! - [`price`]: geometric Brownian motion price process with order-flow pressure
//! - [`ledger`]: player balances and inventories with non-negativity invariants
//!
//! Nothing here is thread-aware; concurrency lives in the `exchange` crate.

pub mod error;
pub mod heap;
pub mod ledger;
pub mod order_book;
pub mod price;

pub use error::{BookError, LedgerError, Result};
pub use heap::OrderHeap;
pub use ledger::{Account, Ledger};
pub use order_book::OrderBook;
pub use price::PriceEngine;
