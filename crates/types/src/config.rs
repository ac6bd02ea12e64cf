//! Configuration types for the trading arena.
//!
//! Two layers: [`MarketParams`] governs a single instrument's price process
//! and order-flow window; [`ExchangeConfig`] governs the exchange fabric
//! (tick loop, task queue, timeouts, session funding).

use crate::money::{Cash, Price};
use serde::{Deserialize, Serialize};

// =============================================================================
// Market Parameters
// =============================================================================

/// Parameters of the stochastic price process for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    /// GBM drift (annualized).
    pub drift: f64,
    /// GBM volatility (annualized, >= 0).
    pub volatility: f64,
    /// Time step per tick (fraction of a trading year).
    pub dt: f64,
    /// Base multiplier for order-flow price adjustment.
    pub base_adjustment: f64,
    /// Scaling applied to order-flow pressure (>= 0).
    pub pressure_factor: f64,
    /// Sliding window for order-flow accumulation, in milliseconds.
    pub time_window_ms: u64,
    /// Hard lower bound on the simulated price.
    pub price_floor: Price,
}

impl MarketParams {
    /// Set the GBM drift.
    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Set the GBM volatility.
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Set the time step per tick.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the order-flow pressure scaling.
    pub fn with_pressure_factor(mut self, factor: f64) -> Self {
        self.pressure_factor = factor;
        self
    }

    /// Set the order-flow window in milliseconds.
    pub fn with_time_window_ms(mut self, window: u64) -> Self {
        self.time_window_ms = window;
        self
    }
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            drift: 0.08,
            volatility: 0.2,
            dt: 1.0 / 252.0,
            base_adjustment: 0.01,
            pressure_factor: 1.0,
            time_window_ms: 60_000,
            price_floor: Price::FLOOR,
        }
    }
}

// =============================================================================
// Exchange Configuration
// =============================================================================

/// Configuration for the exchange fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Period of the tick loop, in milliseconds.
    pub tick_interval_ms: u64,
    /// Bound on the coordinator task queue.
    pub queue_capacity: usize,
    /// Number of runner tasks draining the task queue.
    pub worker_pool_size: usize,
    /// Per-task retry budget for queued submissions.
    pub max_retries: u32,
    /// Base retry delay in milliseconds (exponential backoff).
    pub retry_delay_ms: u64,
    /// Bound on a single worker request/response round trip, in milliseconds.
    pub request_timeout_ms: u64,
    /// Funds granted to a newly created session.
    pub starting_balance: Cash,
    /// Price process parameters applied to every spawned market.
    pub market: MarketParams,
}

impl ExchangeConfig {
    /// Set the tick interval.
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Set the task queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the runner pool size.
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Set the starting balance for new sessions.
    pub fn with_starting_balance(mut self, balance: Cash) -> Self {
        self.starting_balance = balance;
        self
    }

    /// Set the market parameters.
    pub fn with_market(mut self, market: MarketParams) -> Self {
        self.market = market;
        self
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            queue_capacity: 1000,
            worker_pool_size: 4,
            max_retries: 3,
            retry_delay_ms: 100,
            request_timeout_ms: 5000,
            starting_balance: Cash::from_float(100_000.0),
            market: MarketParams::default(),
        }
    }
}
