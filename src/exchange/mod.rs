//! The exchange contract and its collaborators.
//!
//! This module provides:
//! - `Exchange`: the abstract capability set any concrete market or backtest
//!   adapter must implement. Action schemes are written against this contract
//!   only.
//! - `ExchangeOptions`: explicit configuration for an adapter (precisions,
//!   trade bounds, window size), passed at construction time.
//! - `SimulatedExchange`: a candle-backed backtest adapter.
//! - `FeaturePipeline`: the surface of the (external) feature-transformation
//!   pipeline an adapter may carry.

mod candle;
mod simulated;

use std::collections::HashMap;

use crate::{
    RoundTo,
    errors::Result,
    trade::Trade,
};

pub use candle::*;
pub use simulated::*;

/// Explicit configuration for an exchange adapter.
///
/// Every tunable has a named field; nothing is pulled from ambient context.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOptions {
    /// The exchange symbol of the instrument to store and measure value in.
    pub base_instrument: String,
    /// Number of trailing observation rows emitted per step. A window of 1
    /// yields flat observations.
    pub window_size: usize,
    /// Decimal rounding precision of the base instrument.
    pub base_precision: u32,
    /// Decimal rounding precision of the traded instrument.
    pub instrument_precision: u32,
    /// Smallest executable instrument amount.
    pub min_trade_amount: f64,
    /// Largest executable instrument amount.
    pub max_trade_amount: f64,
    /// Smallest executable trade price.
    pub min_trade_price: f64,
    /// Largest executable trade price.
    pub max_trade_price: f64,
    /// Commission charged on each fill, as a percentage of the fill value.
    pub commission_percent: f64,
    /// Upper bound of the uniform slippage applied to fills, as a percentage
    /// of the bound trade price.
    pub max_allowed_slippage_percent: f64,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            base_instrument: "USD".to_string(),
            window_size: 1,
            base_precision: 2,
            instrument_precision: 8,
            min_trade_amount: 1e-6,
            max_trade_amount: 1e6,
            min_trade_price: 1e-8,
            max_trade_price: 1e8,
            commission_percent: 0.3,
            max_allowed_slippage_percent: 1.0,
        }
    }
}

/// Static shape declaration for the observations an exchange emits.
///
/// This describes shape and elementwise bounds, not data: `[window, columns]`
/// when the configured window size is greater than 1, `[columns]` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSpace {
    shape: Vec<usize>,
    low: f64,
    high: f64,
}

impl ObservationSpace {
    /// Returns the observation shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the elementwise lower bound.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the elementwise upper bound.
    pub fn high(&self) -> f64 {
        self.high
    }
}

/// A balance / net-worth snapshot recorded by an adapter after each fill.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSnapshot {
    step: usize,
    balance: f64,
    net_worth: f64,
}

impl From<(usize, f64, f64)> for PerformanceSnapshot {
    fn from((step, balance, net_worth): (usize, f64, f64)) -> Self {
        Self {
            step,
            balance,
            net_worth,
        }
    }
}

impl PerformanceSnapshot {
    /// Returns the step at which the snapshot was taken.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Returns the base-instrument balance at the snapshot.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the net worth at the snapshot.
    pub fn net_worth(&self) -> f64 {
        self.net_worth
    }
}

/// The feature-transformation pipeline an exchange may carry.
///
/// The pipeline is an external collaborator: the exchange only invokes
/// `transform` on each emitted observation and `reset` transitively through
/// its own `reset`.
pub trait FeaturePipeline {
    /// Re-initializes any internal pipeline state.
    fn reset(&mut self);

    /// Transforms one observation matrix into its feature representation.
    fn transform(&mut self, observation: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>>;
}

/// Replaces non-finite cells (NaN, infinities) with `0.0`.
///
/// Observation sources with missing values must be filled before the matrix
/// leaves the exchange.
pub(crate) fn fill_non_finite(matrix: &mut [Vec<f64>]) {
    for row in matrix.iter_mut() {
        for cell in row.iter_mut() {
            if !cell.is_finite() {
                *cell = 0.0;
            }
        }
    }
}

/// The abstract capability set a trading environment needs from a market.
///
/// Concrete adapters (simulated, paper, live) implement the required
/// operations; the derived operations are provided once on top of them. An
/// adapter that cannot support a capability returns
/// [`Error::NotImplemented`](crate::errors::Error::NotImplemented), which is a
/// contract violation and must propagate to the caller rather than be
/// swallowed.
pub trait Exchange {
    /// Returns the adapter's configuration.
    fn options(&self) -> &ExchangeOptions;

    /// The base-instrument balance the exchange started with.
    fn initial_balance(&self) -> Result<f64>;

    /// The current base-instrument balance.
    fn balance(&self) -> Result<f64>;

    /// The current non-base holdings. Only strictly positive amounts are
    /// included; zero or negative holdings are excluded by contract.
    fn portfolio(&self) -> Result<HashMap<String, f64>>;

    /// The trades executed since the last reset.
    fn trades(&self) -> Result<&[Trade]>;

    /// The performance snapshots recorded since the last reset.
    fn performance(&self) -> Result<&[PerformanceSnapshot]>;

    /// The columns of the observation matrix, after any feature transformations.
    fn observation_columns(&self) -> Result<Vec<String>>;

    /// Whether the data source has more observations. When `false`, resetting
    /// the exchange may be necessary to continue generating observations.
    fn has_next_observation(&self) -> bool;

    /// Advances the data cursor and returns the next observation matrix.
    /// Missing values are filled with `0.0` before the matrix is returned.
    fn next_observation(&mut self) -> Result<Vec<Vec<f64>>>;

    /// The latest quote for `symbol`, in base-instrument units. Always positive.
    fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Executes a trade, accounting for slippage and fees, and returns the
    /// filled trade. Amount and price of the fill may differ from the request.
    fn execute_trade(&mut self, trade: &Trade) -> Result<Trade>;

    /// Clears trade history and performance tracking, restores the initial
    /// balance, and re-initializes the attached feature pipeline if present.
    fn reset(&mut self) -> Result<()>;

    /// The current holding of `symbol`, or `0.0` if absent. Total over every
    /// symbol; never fails for an unknown one.
    fn instrument_balance(&self, symbol: &str) -> Result<f64> {
        Ok(self.portfolio()?.get(symbol).copied().unwrap_or(0.0))
    }

    /// The total value of the account: balance plus the market value of every
    /// non-base holding.
    fn net_worth(&self) -> Result<f64> {
        let mut net_worth = self.balance()?;

        for (symbol, amount) in self.portfolio()? {
            if symbol == self.options().base_instrument {
                continue;
            }
            net_worth += self.current_price(&symbol)? * amount;
        }

        Ok(net_worth)
    }

    /// Net worth as a percentage of the initial balance.
    fn profit_loss_percent(&self) -> Result<f64> {
        Ok(self.net_worth()? / self.initial_balance()? * 100.0)
    }

    /// The shape and bounds of the observations this exchange emits.
    fn observation_space(&self) -> Result<ObservationSpace> {
        let n_columns = self.observation_columns()?.len();
        let options = self.options();

        let shape = if options.window_size > 1 {
            vec![options.window_size, n_columns]
        } else {
            vec![n_columns]
        };

        Ok(ObservationSpace {
            shape,
            low: options.min_trade_price,
            high: options.max_trade_price,
        })
    }

    /// Clamps a raw price into the configured `[min, max]` trade-price range,
    /// rounding both the bounds and the input to the base precision first.
    /// Idempotent and monotonic.
    fn bind_trade_price(&self, price: f64) -> f64 {
        let options = self.options();
        let precision = options.base_precision;

        price
            .round_dp(precision)
            .max(options.min_trade_price.round_dp(precision))
            .min(options.max_trade_price.round_dp(precision))
    }

    /// Clamps a raw amount into the configured `[min, max]` trade-amount
    /// range, rounding both the bounds and the input to the instrument
    /// precision first. Guarantees executed quantities never exceed the
    /// configured exchange limits regardless of scheme arithmetic.
    fn bind_trade_amount(&self, amount: f64) -> f64 {
        let options = self.options();
        let precision = options.instrument_precision;

        amount
            .round_dp(precision)
            .max(options.min_trade_amount.round_dp(precision))
            .min(options.max_trade_amount.round_dp(precision))
    }
}
