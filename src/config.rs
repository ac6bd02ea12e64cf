//! Central configuration for the demo driver.
//!
//! All demo parameters are defined here for easy tuning.

use types::Quantity;

/// Master configuration for the demo run.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Markets to open: (item id, initial price).
    pub items: Vec<(String, f64)>,
    /// Number of simulated player sessions.
    pub num_players: usize,
    /// Inventory of every item granted to each player at start.
    pub seed_inventory: Quantity,
    /// Rounds of order submission to run.
    pub rounds: u64,
    /// Delay between rounds in milliseconds.
    pub round_delay_ms: u64,
    /// Probability a player places an order each round (0.0 - 1.0).
    pub order_probability: f64,
    /// Maximum limit-price deviation from the current price as a fraction.
    pub price_deviation: f64,
    /// Minimum order size.
    pub min_quantity: f64,
    /// Maximum order size.
    pub max_quantity: f64,
    /// RNG seed for the demo traders.
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            items: vec![
                ("BTC".to_string(), 50_000.0),
                ("GOLD".to_string(), 2_400.0),
                ("OIL".to_string(), 78.0),
            ],
            num_players: 12,
            seed_inventory: Quantity::from_float(25.0),
            rounds: 200,
            round_delay_ms: 25,
            order_probability: 0.6,
            price_deviation: 0.02,
            min_quantity: 0.5,
            max_quantity: 5.0,
            seed: 42,
        }
    }
}

impl DemoConfig {
    /// Quick run: fewer players, fewer rounds.
    pub fn quick() -> Self {
        Self {
            num_players: 4,
            rounds: 40,
            ..Self::default()
        }
    }

    /// Busy market: more players, denser order flow.
    pub fn busy() -> Self {
        Self {
            num_players: 40,
            rounds: 1_000,
            order_probability: 0.8,
            ..Self::default()
        }
    }
}
