//! Action schemes: the translation layer between an RL agent's discrete
//! action codes and concrete trade orders.
//!
//! Two schemes are provided:
//! - `DiscreteActions`: stateless, maps one code deterministically to one
//!   fraction-of-balance trade.
//! - `TargetStopActions`: stateful, maintains a ledger of open positions and
//!   evaluates exit conditions on every step before opening new ones.

mod discrete;
mod target_stop;

pub use discrete::*;
pub use target_stop::*;

#[cfg(test)]
mod scenarios;

use crate::{errors::Result, exchange::Exchange, trade::Trade};

/// Maps a discrete action code chosen by an agent to a concrete trade.
///
/// The environment calls [`get_trade`](Self::get_trade) once per simulated
/// time step and forwards the returned trade to the exchange's
/// `execute_trade`. The exchange is passed per call rather than stored:
/// a scheme owns nothing but its configuration and (for stateful schemes)
/// its ledger, so parallel environments can each pair their own scheme with
/// their own exchange.
pub trait ActionScheme {
    /// Size of the discrete action space. The decoding logic stays consistent
    /// with this: every code in `[0, n_actions)` decodes to a valid trade.
    fn n_actions(&self) -> usize;

    /// Decodes `action` into a trade against the given exchange.
    fn get_trade(&mut self, exchange: &dyn Exchange, action: usize) -> Result<Trade>;

    /// Restores the scheme to its initial state. Called at episode start.
    fn reset(&mut self);
}
