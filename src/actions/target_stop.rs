use crate::{
    PercentCalculus, RoundTo,
    actions::ActionScheme,
    errors::{Error, Result},
    exchange::Exchange,
    trade::{Trade, TradeType},
};

/// Configuration for [`TargetStopActions`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStopOptions {
    /// The exchange symbol of the instrument being traded.
    pub instrument_symbol: String,
    /// The number of discrete action codes, and the number of bins the
    /// balance is divided by for each position.
    pub position_size: usize,
    /// The number of buckets the profit-target percentage is discretized into.
    pub profit_target_buckets: usize,
    /// The number of buckets the stop-loss percentage is discretized into.
    pub stop_loss_buckets: usize,
    /// Number of steps a position may stay open before it is sold at market.
    pub timeout_steps: usize,
    /// Fraction of the balance withheld from buy sizing, as a percentage.
    pub balance_reserve_percent: f64,
}

impl Default for TargetStopOptions {
    fn default() -> Self {
        Self {
            instrument_symbol: "BTC".to_string(),
            position_size: 20,
            profit_target_buckets: 20,
            stop_loss_buckets: 20,
            timeout_steps: usize::MAX,
            balance_reserve_percent: 1.0,
        }
    }
}

/// One open simulated position in the scheme's ledger.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    opened_at_step: usize,
    entry_price: f64,
    amount: f64,
    profit_target_percent: f64,
    stop_loss_percent: f64,
}

impl From<(usize, f64, f64, f64, f64)> for OpenPosition {
    fn from(
        (opened_at_step, entry_price, amount, profit_target_percent, stop_loss_percent): (
            usize,
            f64,
            f64,
            f64,
            f64,
        ),
    ) -> Self {
        Self {
            opened_at_step,
            entry_price,
            amount,
            profit_target_percent,
            stop_loss_percent,
        }
    }
}

impl OpenPosition {
    /// Returns the step the position was opened at.
    pub fn opened_at_step(&self) -> usize {
        self.opened_at_step
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the position amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the profit-target threshold, as a percentage above entry.
    pub fn profit_target_percent(&self) -> f64 {
        self.profit_target_percent
    }

    /// Returns the stop-loss threshold, as a percentage below entry.
    pub fn stop_loss_percent(&self) -> f64 {
        self.stop_loss_percent
    }

    // Whether any exit condition holds at the given price and step.
    fn should_exit(&self, current_price: f64, current_step: usize, timeout_steps: usize) -> bool {
        let profit_target_hit = current_price >= self.entry_price.addpercent(self.profit_target_percent);
        let stop_loss_hit = current_price <= self.entry_price.subpercent(self.stop_loss_percent);
        let timeout_hit = current_step - self.opened_at_step >= timeout_steps;

        profit_target_hit || stop_loss_hit || timeout_hit
    }
}

/// Position-tracking action scheme.
///
/// Decodes an action into either a forced exit of an already-open position
/// whose exit condition has fired, or a new entry. The scheme keeps an
/// ordered ledger of open positions; on every step the ledger is scanned in
/// insertion order *before* any new position is considered, and the first
/// entry whose profit target, stop loss, or timeout has fired is closed with
/// a market sell. At most one position is closed per call: when several
/// entries match at once, the rest surface on subsequent calls.
///
/// The action code jointly selects the trade kind (`action % 4`), the size
/// fraction, and the two exit thresholds (all from the `action / 4` bucket).
///
/// A sell action with no eligible position decodes to a zero-amount trade:
/// there is nothing tracked to close, and an explicit no-op keeps every code
/// in the action space executable.
#[derive(Debug, Clone)]
pub struct TargetStopActions {
    options: TargetStopOptions,
    current_step: usize,
    ledger: Vec<OpenPosition>,
}

impl TargetStopActions {
    /// Creates the scheme, validating its configuration.
    pub fn new(options: TargetStopOptions) -> Result<Self> {
        if options.position_size < TradeType::CARDINALITY {
            return Err(Error::InvalidConfiguration(format!(
                "position_size must be at least {} (got: {})",
                TradeType::CARDINALITY,
                options.position_size
            )));
        }
        if options.profit_target_buckets == 0 || options.stop_loss_buckets == 0 {
            return Err(Error::InvalidConfiguration(
                "profit_target_buckets and stop_loss_buckets must be at least 1".to_string(),
            ));
        }
        if options.timeout_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "timeout_steps must be at least 1".to_string(),
            ));
        }
        if !(0.0..100.0).contains(&options.balance_reserve_percent) {
            return Err(Error::InvalidConfiguration(format!(
                "balance_reserve_percent must be in [0, 100) (got: {})",
                options.balance_reserve_percent
            )));
        }

        Ok(Self {
            options,
            current_step: 0,
            ledger: Vec::new(),
        })
    }

    /// Returns the scheme configuration.
    pub fn options(&self) -> &TargetStopOptions {
        &self.options
    }

    /// Returns the number of `get_trade` calls since the last reset.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Returns the open positions, in insertion order.
    pub fn open_positions(&self) -> &[OpenPosition] {
        &self.ledger
    }

    // 1-indexed fraction of the bucket selected by `action / 4`.
    fn fraction(&self, action: usize) -> f64 {
        let n_splits = self.options.position_size as f64 / TradeType::CARDINALITY as f64;
        (action / TradeType::CARDINALITY) as f64 / n_splits + 1.0 / n_splits
    }

    // 1-indexed percentage bucket in (0, 100].
    fn exit_percent(bucket: usize, n_buckets: usize) -> f64 {
        100.0 * ((bucket % n_buckets) as f64 + 1.0) / n_buckets as f64
    }
}

impl ActionScheme for TargetStopActions {
    fn n_actions(&self) -> usize {
        self.options.position_size
    }

    fn get_trade(&mut self, exchange: &dyn Exchange, action: usize) -> Result<Trade> {
        let trade_type = TradeType::from_action(action);
        let fraction = self.fraction(action);
        let bucket = action / TradeType::CARDINALITY;
        let profit_target = Self::exit_percent(bucket, self.options.profit_target_buckets);
        let stop_loss = Self::exit_percent(bucket, self.options.stop_loss_buckets);

        let base_precision = exchange.options().base_precision;
        let instrument_precision = exchange.options().instrument_precision;
        let symbol = &self.options.instrument_symbol;
        let current_price = exchange.current_price(symbol)?.round_dp(base_precision);

        let current_step = self.current_step;
        // exactly once per call, whichever branch is taken
        self.current_step += 1;

        // Exit scan, with priority over new entries: the first entry in
        // insertion order whose condition fired is removed and sold. The
        // index is resolved before the removal mutates the ledger.
        let fired = self
            .ledger
            .iter()
            .position(|entry| entry.should_exit(current_price, current_step, self.options.timeout_steps));
        if let Some(index) = fired {
            let entry = self.ledger.remove(index);
            let amount_held = exchange.instrument_balance(symbol)?;
            let amount = amount_held.min(entry.amount());

            return Ok(Trade::from((symbol.as_str(), TradeType::MarketSell, amount, current_price)));
        }

        if trade_type.is_buy() {
            let reserve = 1.0 - self.options.balance_reserve_percent / 100.0;
            let amount = (exchange.balance()? * reserve * fraction / current_price)
                .round_dp(instrument_precision);

            self.ledger.push(OpenPosition::from((
                current_step,
                current_price,
                amount,
                profit_target,
                stop_loss,
            )));

            return Ok(Trade::from((symbol.as_str(), trade_type, amount, current_price)));
        }

        // sell decoded, nothing eligible to close: explicit zero-amount no-op
        Ok(Trade::from((symbol.as_str(), trade_type, 0.0, current_price)))
    }

    fn reset(&mut self) {
        self.current_step = 0;
        self.ledger.clear();
    }
}

#[cfg(test)]
mod tracking {
    use super::*;
    use crate::exchange::{ExchangeOptions, SimulatedExchange};

    fn flat_exchange(price: f64, balance: f64) -> SimulatedExchange {
        let candle = (price, price, price, price, 1.0).into();
        let options = ExchangeOptions {
            commission_percent: 0.0,
            max_allowed_slippage_percent: 0.0,
            ..ExchangeOptions::default()
        };
        SimulatedExchange::new(vec![candle], balance, options).unwrap()
    }

    fn scheme_with(options: TargetStopOptions) -> TargetStopActions {
        TargetStopActions::new(options).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        for options in [
            TargetStopOptions {
                position_size: 2,
                ..TargetStopOptions::default()
            },
            TargetStopOptions {
                profit_target_buckets: 0,
                ..TargetStopOptions::default()
            },
            TargetStopOptions {
                timeout_steps: 0,
                ..TargetStopOptions::default()
            },
        ] {
            assert!(matches!(
                TargetStopActions::new(options),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn exit_percent_is_one_indexed_and_never_zero() {
        assert_eq!(TargetStopActions::exit_percent(0, 20), 5.0);
        assert_eq!(TargetStopActions::exit_percent(4, 20), 25.0);
        assert_eq!(TargetStopActions::exit_percent(19, 20), 100.0);
        // wraps instead of growing past 100
        assert_eq!(TargetStopActions::exit_percent(20, 20), 5.0);
    }

    #[test]
    fn buy_opens_a_ledger_entry() {
        let exchange = flat_exchange(100.0, 1000.0);
        let mut scheme = scheme_with(TargetStopOptions::default());

        let trade = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(trade.trade_type(), TradeType::MarketBuy);
        // 1000 * 0.99 * (1/5) / 100
        assert_eq!(trade.amount(), 1.98);
        assert_eq!(trade.price(), 100.0);

        assert_eq!(scheme.current_step(), 1);
        let entry = &scheme.open_positions()[0];
        assert_eq!(entry.opened_at_step(), 0);
        assert_eq!(entry.entry_price(), 100.0);
        assert_eq!(entry.amount(), 1.98);
        assert_eq!(entry.profit_target_percent(), 5.0);
        assert_eq!(entry.stop_loss_percent(), 5.0);
    }

    #[test]
    fn profit_target_forces_a_market_sell() {
        let mut scheme = scheme_with(TargetStopOptions::default());

        let exchange = flat_exchange(100.0, 1000.0);
        scheme.get_trade(&exchange, 1).unwrap(); // entry at 100, target 5%

        // price reaches the 5% target
        let exchange = flat_exchange(105.0, 1000.0);
        let trade = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(trade.trade_type(), TradeType::MarketSell);
        assert_eq!(trade.price(), 105.0);
        assert!(scheme.open_positions().is_empty());
        // the exit call does not also open a new position
        assert_eq!(scheme.current_step(), 2);
    }

    #[test]
    fn stop_loss_forces_a_market_sell() {
        let mut scheme = scheme_with(TargetStopOptions::default());

        let exchange = flat_exchange(100.0, 1000.0);
        scheme.get_trade(&exchange, 1).unwrap(); // entry at 100, stop 5%

        let exchange = flat_exchange(95.0, 1000.0);
        let trade = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(trade.trade_type(), TradeType::MarketSell);
        assert!(scheme.open_positions().is_empty());
    }

    #[test]
    fn exit_amount_is_clamped_to_holdings() {
        let mut exchange = flat_exchange(100.0, 1000.0);
        let mut scheme = scheme_with(TargetStopOptions {
            timeout_steps: 1,
            ..TargetStopOptions::default()
        });

        let buy = scheme.get_trade(&exchange, 1).unwrap();
        // only part of the requested entry actually fills
        let partial = Trade::from((buy.symbol(), buy.trade_type(), 0.5, buy.price()));
        exchange.execute_trade(&partial).unwrap();

        let exit = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(exit.trade_type(), TradeType::MarketSell);
        assert_eq!(exit.amount(), 0.5); // min(held, entry amount)
    }

    #[test]
    fn sell_with_no_eligible_position_is_a_zero_amount_trade() {
        let exchange = flat_exchange(100.0, 1000.0);
        let mut scheme = scheme_with(TargetStopOptions::default());

        let trade = scheme.get_trade(&exchange, 2).unwrap();
        assert_eq!(trade.trade_type(), TradeType::LimitSell);
        assert_eq!(trade.amount(), 0.0);
        assert_eq!(trade.price(), 100.0);
        assert!(scheme.open_positions().is_empty());
        // the step counter still advances
        assert_eq!(scheme.current_step(), 1);
    }

    #[test]
    fn reset_clears_step_and_ledger() {
        let exchange = flat_exchange(100.0, 1000.0);
        let mut scheme = scheme_with(TargetStopOptions::default());

        scheme.get_trade(&exchange, 1).unwrap();
        scheme.get_trade(&exchange, 0).unwrap();
        assert_eq!(scheme.current_step(), 2);
        assert_eq!(scheme.open_positions().len(), 2);

        scheme.reset();
        assert_eq!(scheme.current_step(), 0);
        assert!(scheme.open_positions().is_empty());
    }
}
