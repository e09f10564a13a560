use crate::{
    RoundTo,
    actions::ActionScheme,
    errors::{Error, Result},
    exchange::Exchange,
    trade::{Trade, TradeType},
};

/// Configuration for [`DiscreteActions`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteActionsOptions {
    /// The number of discrete action codes. Intended to be a multiple of the
    /// four trade kinds; other values are accepted but bias the bucket
    /// boundaries.
    pub n_actions: usize,
    /// The exchange symbol of the instrument being traded.
    pub instrument_symbol: String,
    /// Fraction of the balance withheld from buy sizing, as a percentage, to
    /// absorb slippage and fees.
    pub balance_reserve_percent: f64,
}

impl Default for DiscreteActionsOptions {
    fn default() -> Self {
        Self {
            n_actions: 20,
            instrument_symbol: "BTC".to_string(),
            balance_reserve_percent: 2.0,
        }
    }
}

/// Stateless discretized-fraction action scheme.
///
/// Each action code decodes to a trade kind (`action % 4`, in
/// [`TradeType`] enumeration order) and a 1-indexed fraction bucket
/// (`action / 4`), so the fraction ranges over `1/n_splits ..= 1` and a
/// zero-size trade is never produced. Buys are sized as a fraction of the
/// balance less the configured reserve; sells as a fraction of the holdings.
///
/// The scheme holds no state: with an unchanged exchange, the same action
/// decodes to the same trade on every call.
#[derive(Debug, Clone)]
pub struct DiscreteActions {
    options: DiscreteActionsOptions,
}

impl DiscreteActions {
    /// Creates the scheme, validating its configuration.
    pub fn new(options: DiscreteActionsOptions) -> Result<Self> {
        if options.n_actions < TradeType::CARDINALITY {
            return Err(Error::InvalidConfiguration(format!(
                "n_actions must be at least {} (got: {})",
                TradeType::CARDINALITY,
                options.n_actions
            )));
        }
        if !(0.0..100.0).contains(&options.balance_reserve_percent) {
            return Err(Error::InvalidConfiguration(format!(
                "balance_reserve_percent must be in [0, 100) (got: {})",
                options.balance_reserve_percent
            )));
        }

        Ok(Self { options })
    }

    /// Returns the scheme configuration.
    pub fn options(&self) -> &DiscreteActionsOptions {
        &self.options
    }

    // 1-indexed fraction of the bucket selected by `action / 4`.
    fn fraction(&self, action: usize) -> f64 {
        let n_splits = self.options.n_actions as f64 / TradeType::CARDINALITY as f64;
        (action / TradeType::CARDINALITY) as f64 / n_splits + 1.0 / n_splits
    }
}

impl ActionScheme for DiscreteActions {
    fn n_actions(&self) -> usize {
        self.options.n_actions
    }

    fn get_trade(&mut self, exchange: &dyn Exchange, action: usize) -> Result<Trade> {
        let trade_type = TradeType::from_action(action);
        let fraction = self.fraction(action);

        let instrument_precision = exchange.options().instrument_precision;
        let symbol = &self.options.instrument_symbol;
        let current_price = exchange.current_price(symbol)?;

        let amount = if trade_type.is_buy() {
            let balance = exchange.balance()?;
            let reserve = 1.0 - self.options.balance_reserve_percent / 100.0;
            (balance * reserve * fraction / current_price).round_dp(instrument_precision)
        } else {
            let amount_held = exchange.instrument_balance(symbol)?;
            (amount_held * fraction).round_dp(instrument_precision)
        };

        Ok(Trade::from((symbol.as_str(), trade_type, amount, current_price)))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
#[test]
fn rejects_invalid_configuration() {
    let options = DiscreteActionsOptions {
        n_actions: 3,
        ..DiscreteActionsOptions::default()
    };
    assert!(matches!(
        DiscreteActions::new(options),
        Err(Error::InvalidConfiguration(_))
    ));

    let options = DiscreteActionsOptions {
        balance_reserve_percent: 100.0,
        ..DiscreteActionsOptions::default()
    };
    assert!(matches!(
        DiscreteActions::new(options),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[cfg(test)]
#[test]
fn fraction_buckets_are_one_indexed() {
    let scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    // n_actions = 20 gives 5 splits of 1/5 each
    assert_eq!(scheme.fraction(0), 0.2);
    assert_eq!(scheme.fraction(1), 0.2);
    assert_eq!(scheme.fraction(5), 0.4);
    assert_eq!(scheme.fraction(6), 0.4);
    assert_eq!(scheme.fraction(19), 1.0);
}

#[cfg(test)]
#[test]
fn fraction_repeats_every_four_codes() {
    let scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    for action in 0..scheme.n_actions() {
        assert_eq!(
            scheme.fraction(action),
            scheme.fraction(action - action % TradeType::CARDINALITY)
        );
    }
}
