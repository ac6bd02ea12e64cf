//! Stochastic reference-price process for one instrument.
//!
//! Each tick advances a geometric Brownian motion step, then tilts the result
//! by order-flow pressure: the signed buy-minus-sell volume imbalance
//! accumulated since the last tick, bounded to [-1, +1]. The outcome is
//! clamped to a hard price floor; a catastrophic negative shock is silently
//! capped rather than resampled.
//!
//! Normal draws use the Box-Muller transform on uniform samples. The first
//! uniform is redrawn while `u <= 1e-5` to keep `ln` well away from zero.

use std::collections::VecDeque;
use std::f64::consts::PI;

use rand::Rng;
use types::{MarketParams, OrderSide, Price, Quantity, Timestamp};

/// GBM price process with order-flow pressure for a single instrument.
#[derive(Debug, Clone)]
pub struct PriceEngine {
    params: MarketParams,
    /// Evolved in f64 so successive ticks do not accumulate rounding.
    current_price: f64,
    /// Buy volume recorded since the last tick.
    buy_volume: f64,
    /// Sell volume recorded since the last tick.
    sell_volume: f64,
    /// Arrival stamps of recorded orders within the sliding window.
    arrival_times: VecDeque<Timestamp>,
}

impl PriceEngine {
    /// Create a new price engine at the given starting price.
    pub fn new(initial_price: Price, params: MarketParams) -> Self {
        Self {
            params,
            current_price: initial_price.to_float(),
            buy_volume: 0.0,
            sell_volume: 0.0,
            arrival_times: VecDeque::new(),
        }
    }

    /// Current reference price.
    pub fn current_price(&self) -> Price {
        Price::from_float(self.current_price)
    }

    /// Configured parameters.
    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    /// Record order flow: feeds the pressure accumulators and the arrival
    /// window. Called by the owning worker on every accepted submission.
    pub fn record_order(&mut self, side: OrderSide, quantity: Quantity, now: Timestamp) {
        match side {
            OrderSide::Buy => self.buy_volume += quantity.to_float(),
            OrderSide::Sell => self.sell_volume += quantity.to_float(),
        }
        self.arrival_times.push_back(now);
    }

    /// Signed volume imbalance over the accumulators, bounded to [-1, +1].
    /// Zero when no volume was recorded.
    pub fn pressure(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total == 0.0 {
            0.0
        } else {
            (self.buy_volume - self.sell_volume) / total
        }
    }

    /// Orders per second observed within the sliding window.
    pub fn arrival_rate(&self, now: Timestamp) -> f64 {
        let window_start = now.saturating_sub(self.params.time_window_ms);
        let recent = self
            .arrival_times
            .iter()
            .filter(|&&t| t >= window_start)
            .count();
        recent as f64 / (self.params.time_window_ms as f64 / 1000.0)
    }

    /// Advance the process one tick and return the new price.
    ///
    /// ```text
    /// drift_term     = (mu - sigma^2 / 2) * dt
    /// diffusion_term = sigma * eps * sqrt(dt)
    /// gbm_price      = current * exp(drift_term + diffusion_term)
    /// adjustment     = base_adjustment * pressure_factor * pressure
    /// new_price      = max(gbm_price * (1 + adjustment), floor)
    /// ```
    ///
    /// Afterwards the volume accumulators are cleared and arrival stamps
    /// older than the window are expired. Zero volatility still drifts;
    /// negative drift is permitted.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Timestamp, rng: &mut R) -> Price {
        let mu = self.params.drift;
        let sigma = self.params.volatility;
        let dt = self.params.dt;

        let eps = normal_draw(rng);
        let drift_term = (mu - sigma * sigma / 2.0) * dt;
        let diffusion_term = sigma * eps * dt.sqrt();
        let gbm_price = self.current_price * (drift_term + diffusion_term).exp();

        let adjustment = self.params.base_adjustment * self.params.pressure_factor * self.pressure();
        let floor = self.params.price_floor.to_float();
        self.current_price = (gbm_price * (1.0 + adjustment)).max(floor);

        self.buy_volume = 0.0;
        self.sell_volume = 0.0;
        let window_start = now.saturating_sub(self.params.time_window_ms);
        while let Some(&front) = self.arrival_times.front() {
            if front < window_start {
                self.arrival_times.pop_front();
            } else {
                break;
            }
        }

        self.current_price()
    }
}

/// One standard normal sample via the Box-Muller transform.
fn normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let mut u1: f64 = rng.random();
    while u1 <= 1e-5 {
        u1 = rng.random();
    }
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
