//! # Tradegym: Simulated Trading Environments for RL Agents
//!
//! **Tradegym** provides the building blocks of a simulated trading environment for
//! reinforcement-learning agents: an abstract exchange contract, a simulated candle-backed
//! exchange, and pluggable action schemes that translate an agent's discrete action code
//! into a concrete trade order.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Trade`** | An intended or executed transaction (symbol, type, amount, price).                              |
//! | **`TradeType`** | The four order kinds (limit/market buy, limit/market sell), also the decoding modulus.      |
//! | **`Exchange`** | The abstract capability set a scheme is written against: balance, portfolio, prices, fills. |
//! | **`SimulatedExchange`** | A concrete backtest adapter over in-memory OHLCV candles, with slippage and fees.  |
//! | **`DiscreteActions`** | Stateless scheme: one action code maps to one fraction-of-balance trade.             |
//! | **`TargetStopActions`** | Stateful scheme: tracks open positions and forces exits on profit target, stop loss, or timeout. |
//!
//! ## How a step works
//! The RL loop calls a scheme's `get_trade(action)` once per simulated time step. The scheme
//! queries the exchange for price, balance and precision, computes a [`Trade`](trade::Trade),
//! optionally updates its own position ledger, and returns the trade for the caller to forward
//! to [`Exchange::execute_trade`](exchange::Exchange::execute_trade).
//!
//! ## Getting Started
//! ```rust
//! use tradegym::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let candles = sample_candles(100, 7, 100.0);
//!     let options = ExchangeOptions {
//!         commission_percent: 0.0,
//!         max_allowed_slippage_percent: 0.0,
//!         ..ExchangeOptions::default()
//!     };
//!     let mut exchange = SimulatedExchange::new(candles, 10_000.0, options)?;
//!     let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default())?;
//!
//!     while exchange.has_next_observation() {
//!         let _observation = exchange.next_observation()?;
//!         let action = 1; // the agent's policy goes here
//!         let trade = scheme.get_trade(&exchange, action)?;
//!         exchange.execute_trade(&trade)?;
//!     }
//!
//!     println!("net worth: {:.2}", exchange.net_worth()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//! Everything is single-threaded and synchronous. A scheme owns its ledger and step counter
//! exclusively; parallel environments each need their own exchange + scheme pair.
//!
//! ## Error Handling
//! Tradegym uses custom error types to handle:
//! - Missing adapter capabilities (`NotImplemented`, a programmer error that propagates).
//! - Invalid scheme or exchange configuration.
//! - Exhausted observation sources and degenerate prices.
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Action schemes: decoding discrete agent actions into trades.
pub mod actions;

/// The exchange contract and the simulated candle-backed adapter.
pub mod exchange;

/// Error types for the library.
pub mod errors;

/// Trade and trade-type value types.
pub mod trade;

/// Utility functions: sample data generation and file loading.
pub mod utils;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::actions::*;
    pub use crate::errors::*;
    pub use crate::exchange::*;
    pub use crate::trade::*;
    pub use crate::utils::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for performing percentage-based calculations.
///
/// This trait provides methods to add, subtract, and compare percentages
/// for numeric types, enabling common financial calculations such as
/// profit-target and stop-loss thresholds.
pub trait PercentCalculus<Rhs = Self> {
    /// Adds a percentage to the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to add (e.g., 10.0 for 10%).
    ///
    /// ### Returns
    /// The value increased by the given percentage.
    fn addpercent(self, rhs: Rhs) -> Self;

    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 10.0 for 10%).
    ///
    /// ### Returns
    /// The value decreased by the given percentage.
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for f64 {
    fn addpercent(self, percent: Self) -> Self {
        self.add(self.mul(percent.div(100.0)))
    }

    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(100.0)))
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}

/// Trait for rounding values to a fixed number of decimal places.
///
/// Exchanges quote precision as a decimal-place count; every
/// precision-sensitive computation in the crate goes through this trait.
pub trait RoundTo {
    /// Rounds to `dp` decimal places (half away from zero).
    fn round_dp(self, dp: u32) -> Self;

    /// Truncates to `dp` decimal places (toward zero).
    fn floor_dp(self, dp: u32) -> Self;
}

impl RoundTo for f64 {
    fn round_dp(self, dp: u32) -> Self {
        let factor = 10f64.powi(dp as i32);
        (self * factor).round() / factor
    }

    fn floor_dp(self, dp: u32) -> Self {
        let factor = 10f64.powi(dp as i32);
        (self * factor).trunc() / factor
    }
}

#[cfg(test)]
mod percent {
    use super::*;

    #[test]
    fn add() {
        assert_eq!(110.0, 100.0.addpercent(10.0))
    }

    #[test]
    fn sub() {
        assert_eq!(90.0, 100.0.subpercent(10.0))
    }

    #[test]
    fn change() {
        assert_eq!(10.0, 100.0.change(110.0))
    }
}
