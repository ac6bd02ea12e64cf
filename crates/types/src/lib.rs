//! Core types for the trading arena market engine.
//!
//! This crate provides all shared data types used across the engine and the
//! exchange fabric: identifier newtypes, fixed-point monetary values, orders,
//! trades, market-data events, and configuration.

pub mod config;
pub mod ids;
pub mod market_data;
pub mod money;
pub mod order;
pub mod trade;

pub use config::{ExchangeConfig, MarketParams};
pub use ids::{ItemId, OrderId, PlayerId, Timestamp, TradeId, PRICE_SCALE};
pub use market_data::{MarketOverview, MarketUpdate, UpdateKind};
pub use money::{Cash, Price, Quantity};
pub use order::{Order, OrderKind, OrderSide, OrderStatus};
pub use trade::Trade;
