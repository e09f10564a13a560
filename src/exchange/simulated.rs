use std::collections::HashMap;

use rand::Rng;

use crate::{
    PercentCalculus, RoundTo,
    errors::{Error, Result},
    exchange::{
        Candle, Exchange, ExchangeOptions, FeaturePipeline, PerformanceSnapshot, fill_non_finite,
    },
    trade::Trade,
};

const OBSERVATION_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// A backtest adapter over an in-memory candle series.
///
/// The exchange walks the series one candle per observation. Fills are
/// simulated against the current candle's close: the requested price and
/// amount are bound to the configured limits, adverse slippage up to
/// `max_allowed_slippage_percent` is drawn uniformly, `commission_percent` is
/// charged on the fill value, and the fill is clamped to what the balance
/// (buys) or the holdings (sells) can cover. Every fill is appended to the
/// trade history together with a performance snapshot.
pub struct SimulatedExchange {
    options: ExchangeOptions,
    data: Vec<Candle>,
    // number of observations consumed since the last reset
    cursor: usize,
    initial_balance: f64,
    balance: f64,
    portfolio: HashMap<String, f64>,
    trades: Vec<Trade>,
    performance: Vec<PerformanceSnapshot>,
    feature_pipeline: Option<Box<dyn FeaturePipeline>>,
}

impl SimulatedExchange {
    /// Creates a new simulated exchange.
    ///
    /// ### Arguments
    /// * `data` - Candle series to walk. Must not be empty.
    /// * `initial_balance` - Starting base-instrument balance. Must be positive.
    /// * `options` - Exchange configuration.
    ///
    /// ### Returns
    /// The new exchange instance or an error.
    pub fn new(data: Vec<Candle>, initial_balance: f64, options: ExchangeOptions) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::CandleDataEmpty);
        }
        if initial_balance <= 0.0 {
            return Err(Error::NegZeroBalance(initial_balance));
        }
        if options.window_size == 0 {
            return Err(Error::InvalidConfiguration(
                "window_size must be at least 1".to_string(),
            ));
        }
        if options.min_trade_amount > options.max_trade_amount
            || options.min_trade_price > options.max_trade_price
        {
            return Err(Error::InvalidConfiguration(
                "trade bounds must satisfy min <= max".to_string(),
            ));
        }
        if options.commission_percent < 0.0 || options.max_allowed_slippage_percent < 0.0 {
            return Err(Error::InvalidConfiguration(
                "commission and slippage percentages must be non-negative".to_string(),
            ));
        }

        Ok(Self {
            options,
            data,
            cursor: 0,
            initial_balance,
            balance: initial_balance,
            portfolio: HashMap::new(),
            trades: Vec::new(),
            performance: Vec::new(),
            feature_pipeline: None,
        })
    }

    /// Attaches a feature pipeline. Observations are run through it, and
    /// `reset` re-initializes it.
    pub fn with_feature_pipeline(mut self, pipeline: Box<dyn FeaturePipeline>) -> Self {
        self.feature_pipeline = Some(pipeline);
        self
    }

    /// Returns an iterator over the candle series.
    pub fn candles(&self) -> std::slice::Iter<'_, Candle> {
        self.data.iter()
    }

    // The candle fills execute against: the most recently observed one, or the
    // first before any observation has been consumed.
    fn current_candle(&self) -> &Candle {
        let index = self.cursor.saturating_sub(1).min(self.data.len() - 1);
        &self.data[index]
    }

    fn fill_price(&self, trade: &Trade) -> f64 {
        let price = self.bind_trade_price(trade.price());
        let max_slippage = self.options.max_allowed_slippage_percent;
        let slippage = if max_slippage > 0.0 {
            rand::rng().random_range(0.0..=max_slippage)
        } else {
            0.0
        };

        // slippage is adverse: buys fill above the bound price, sells below
        let slipped = if trade.trade_type().is_buy() {
            price.addpercent(slippage)
        } else {
            price.subpercent(slippage)
        };
        self.bind_trade_price(slipped)
    }
}

impl Exchange for SimulatedExchange {
    fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    fn initial_balance(&self) -> Result<f64> {
        Ok(self.initial_balance)
    }

    fn balance(&self) -> Result<f64> {
        Ok(self.balance)
    }

    fn portfolio(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .portfolio
            .iter()
            .filter(|(_, amount)| **amount > 0.0)
            .map(|(symbol, amount)| (symbol.clone(), *amount))
            .collect())
    }

    fn trades(&self) -> Result<&[Trade]> {
        Ok(&self.trades)
    }

    fn performance(&self) -> Result<&[PerformanceSnapshot]> {
        Ok(&self.performance)
    }

    fn observation_columns(&self) -> Result<Vec<String>> {
        Ok(OBSERVATION_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    fn has_next_observation(&self) -> bool {
        self.cursor < self.data.len()
    }

    fn next_observation(&mut self) -> Result<Vec<Vec<f64>>> {
        if self.cursor >= self.data.len() {
            return Err(Error::ObservationsExhausted);
        }

        let window_size = self.options.window_size;
        let n_columns = OBSERVATION_COLUMNS.len();
        let mut matrix = Vec::with_capacity(window_size);

        // trailing window ending at the cursor candle, zero-padded in front
        // until enough history has accumulated
        let missing = window_size.saturating_sub(self.cursor + 1);
        for _ in 0..missing {
            matrix.push(vec![0.0; n_columns]);
        }
        let first = (self.cursor + 1).saturating_sub(window_size);
        for candle in &self.data[first..=self.cursor] {
            matrix.push(vec![
                candle.open(),
                candle.high(),
                candle.low(),
                candle.close(),
                candle.volume(),
            ]);
        }

        self.cursor += 1;
        fill_non_finite(&mut matrix);

        match self.feature_pipeline.as_mut() {
            Some(pipeline) => pipeline.transform(matrix),
            None => Ok(matrix),
        }
    }

    fn current_price(&self, _symbol: &str) -> Result<f64> {
        // single-instrument simulation: every symbol quotes the series
        let close = self.current_candle().close();
        if close <= 0.0 || !close.is_finite() {
            return Err(Error::NonPositivePrice(close));
        }
        Ok(close)
    }

    fn execute_trade(&mut self, trade: &Trade) -> Result<Trade> {
        let fill_price = self.fill_price(trade);
        if fill_price <= 0.0 {
            return Err(Error::NonPositivePrice(fill_price));
        }

        let precision = self.options.instrument_precision;
        let commission = self.options.commission_percent / 100.0;
        let requested = self.bind_trade_amount(trade.amount());

        let fill_amount = if trade.trade_type().is_buy() {
            // never spend more than the balance, fees included
            let affordable = self.balance / (fill_price * (1.0 + commission));
            let amount = requested.min(affordable).floor_dp(precision);
            let cost = amount * fill_price * (1.0 + commission);
            self.balance -= cost;
            *self
                .portfolio
                .entry(trade.symbol().to_string())
                .or_insert(0.0) += amount;
            amount
        } else {
            // never deliver more than is held
            let held = self.instrument_balance(trade.symbol())?;
            let amount = requested.min(held).floor_dp(precision);
            let proceeds = amount * fill_price * (1.0 - commission);
            self.balance += proceeds;
            if let Some(holding) = self.portfolio.get_mut(trade.symbol()) {
                *holding -= amount;
                if *holding <= 0.0 {
                    self.portfolio.remove(trade.symbol());
                }
            }
            amount
        };

        let filled = Trade::from((trade.symbol(), trade.trade_type(), fill_amount, fill_price));
        self.trades.push(filled.clone());

        let net_worth = self.net_worth()?;
        self.performance
            .push(PerformanceSnapshot::from((self.cursor, self.balance, net_worth)));

        Ok(filled)
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        self.balance = self.initial_balance;
        self.portfolio.clear();
        self.trades.clear();
        self.performance.clear();
        if let Some(pipeline) = self.feature_pipeline.as_mut() {
            pipeline.reset();
        }
        Ok(())
    }
}

#[cfg(test)]
fn flat_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .map(|&close| Candle::from((close, close, close, close, 1.0)))
        .collect()
}

#[cfg(test)]
fn frictionless_options() -> ExchangeOptions {
    ExchangeOptions {
        commission_percent: 0.0,
        max_allowed_slippage_percent: 0.0,
        ..ExchangeOptions::default()
    }
}

#[cfg(test)]
#[test]
fn new_rejects_bad_inputs() {
    let result = SimulatedExchange::new(vec![], 1000.0, ExchangeOptions::default());
    assert!(matches!(result, Err(Error::CandleDataEmpty)));

    let result = SimulatedExchange::new(flat_candles(&[100.0]), 0.0, ExchangeOptions::default());
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let options = ExchangeOptions {
        window_size: 0,
        ..ExchangeOptions::default()
    };
    let result = SimulatedExchange::new(flat_candles(&[100.0]), 1000.0, options);
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[cfg(test)]
#[test]
fn observations_walk_the_series() {
    let candles = flat_candles(&[100.0, 110.0, 120.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options()).unwrap();

    assert!(exchange.has_next_observation());
    assert_eq!(exchange.next_observation().unwrap(), vec![vec![100.0, 100.0, 100.0, 100.0, 1.0]]);
    assert_eq!(exchange.current_price("BTC").unwrap(), 100.0);

    exchange.next_observation().unwrap();
    assert_eq!(exchange.current_price("BTC").unwrap(), 110.0);

    exchange.next_observation().unwrap();
    assert_eq!(exchange.current_price("BTC").unwrap(), 120.0);

    assert!(!exchange.has_next_observation());
    assert!(matches!(exchange.next_observation(), Err(Error::ObservationsExhausted)));
}

#[cfg(test)]
#[test]
fn windowed_observations_are_zero_padded() {
    let candles = flat_candles(&[100.0, 110.0]);
    let options = ExchangeOptions {
        window_size: 3,
        ..frictionless_options()
    };
    let mut exchange = SimulatedExchange::new(candles, 1000.0, options).unwrap();

    let first = exchange.next_observation().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0], vec![0.0; 5]);
    assert_eq!(first[1], vec![0.0; 5]);
    assert_eq!(first[2], vec![100.0, 100.0, 100.0, 100.0, 1.0]);

    let second = exchange.next_observation().unwrap();
    assert_eq!(second[0], vec![0.0; 5]);
    assert_eq!(second[1], vec![100.0, 100.0, 100.0, 100.0, 1.0]);
    assert_eq!(second[2], vec![110.0, 110.0, 110.0, 110.0, 1.0]);
}

#[cfg(test)]
#[test]
fn frictionless_round_trip_settles_exactly() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options()).unwrap();

    let buy = Trade::from(("BTC", TradeType::MarketBuy, 2.0, 100.0));
    let filled = exchange.execute_trade(&buy).unwrap();
    assert_eq!(filled.amount(), 2.0);
    assert_eq!(filled.price(), 100.0);
    assert_eq!(exchange.balance().unwrap(), 800.0);
    assert_eq!(exchange.instrument_balance("BTC").unwrap(), 2.0);
    assert_eq!(exchange.net_worth().unwrap(), 1000.0);

    let sell = Trade::from(("BTC", TradeType::MarketSell, 2.0, 100.0));
    exchange.execute_trade(&sell).unwrap();
    assert_eq!(exchange.balance().unwrap(), 1000.0);
    assert_eq!(exchange.instrument_balance("BTC").unwrap(), 0.0);

    assert_eq!(exchange.trades().unwrap().len(), 2);
    assert_eq!(exchange.performance().unwrap().len(), 2);
}

#[cfg(test)]
#[test]
fn buys_are_clamped_to_the_balance() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options()).unwrap();

    // requests 50 units (5000 base) with only 1000 available
    let buy = Trade::from(("BTC", TradeType::MarketBuy, 50.0, 100.0));
    let filled = exchange.execute_trade(&buy).unwrap();

    assert!(filled.amount() <= 10.0);
    assert!(exchange.balance().unwrap() >= 0.0);
}

#[cfg(test)]
#[test]
fn sells_are_clamped_to_holdings() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options()).unwrap();

    exchange
        .execute_trade(&Trade::from(("BTC", TradeType::MarketBuy, 1.5, 100.0)))
        .unwrap();
    let filled = exchange
        .execute_trade(&Trade::from(("BTC", TradeType::MarketSell, 10.0, 100.0)))
        .unwrap();

    assert_eq!(filled.amount(), 1.5);
    assert_eq!(exchange.instrument_balance("BTC").unwrap(), 0.0);
    assert!(exchange.portfolio().unwrap().is_empty());
}

#[cfg(test)]
#[test]
fn adverse_slippage_stays_within_the_configured_bound() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0]);
    let options = ExchangeOptions {
        commission_percent: 0.0,
        max_allowed_slippage_percent: 1.0,
        ..ExchangeOptions::default()
    };
    let mut exchange = SimulatedExchange::new(candles, 10_000.0, options).unwrap();

    for _ in 0..20 {
        let filled = exchange
            .execute_trade(&Trade::from(("BTC", TradeType::MarketBuy, 0.1, 100.0)))
            .unwrap();
        assert!(filled.price() >= 100.0);
        assert!(filled.price() <= 101.0);
    }
}

#[cfg(test)]
#[test]
fn commission_is_charged_on_fill_value() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0]);
    let options = ExchangeOptions {
        commission_percent: 1.0,
        max_allowed_slippage_percent: 0.0,
        ..ExchangeOptions::default()
    };
    let mut exchange = SimulatedExchange::new(candles, 1000.0, options).unwrap();

    exchange
        .execute_trade(&Trade::from(("BTC", TradeType::MarketBuy, 1.0, 100.0)))
        .unwrap();

    // 100 for the fill plus 1% commission
    assert_eq!(exchange.balance().unwrap(), 899.0);
}

#[cfg(test)]
#[test]
fn reset_restores_the_initial_state() {
    use crate::trade::TradeType;

    let candles = flat_candles(&[100.0, 110.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options()).unwrap();

    exchange.next_observation().unwrap();
    exchange
        .execute_trade(&Trade::from(("BTC", TradeType::MarketBuy, 1.0, 100.0)))
        .unwrap();

    exchange.reset().unwrap();
    assert_eq!(exchange.balance().unwrap(), 1000.0);
    assert!(exchange.portfolio().unwrap().is_empty());
    assert!(exchange.trades().unwrap().is_empty());
    assert!(exchange.performance().unwrap().is_empty());
    assert!(exchange.has_next_observation());
    assert_eq!(exchange.current_price("BTC").unwrap(), 100.0);
}

#[cfg(test)]
#[test]
fn feature_pipeline_is_applied_and_reset() {
    use std::cell::Cell;
    use std::rc::Rc;

    struct Doubler {
        resets: Rc<Cell<usize>>,
    }

    impl FeaturePipeline for Doubler {
        fn reset(&mut self) {
            self.resets.set(self.resets.get() + 1);
        }

        fn transform(&mut self, observation: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
            Ok(observation
                .into_iter()
                .map(|row| row.into_iter().map(|cell| cell * 2.0).collect())
                .collect())
        }
    }

    let resets = Rc::new(Cell::new(0));
    let pipeline = Doubler {
        resets: resets.clone(),
    };
    let candles = flat_candles(&[100.0]);
    let mut exchange = SimulatedExchange::new(candles, 1000.0, frictionless_options())
        .unwrap()
        .with_feature_pipeline(Box::new(pipeline));

    let observation = exchange.next_observation().unwrap();
    assert_eq!(observation, vec![vec![200.0, 200.0, 200.0, 200.0, 2.0]]);

    exchange.reset().unwrap();
    assert_eq!(resets.get(), 1);
}
