use super::*;
use crate::exchange::{Candle, ExchangeOptions, SimulatedExchange};
use crate::trade::TradeType;

fn flat_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .map(|&close| Candle::from((close, close, close, close, 1.0)))
        .collect()
}

fn frictionless_exchange(closes: &[f64], balance: f64) -> SimulatedExchange {
    let options = ExchangeOptions {
        commission_percent: 0.0,
        max_allowed_slippage_percent: 0.0,
        ..ExchangeOptions::default()
    };
    SimulatedExchange::new(flat_candles(closes), balance, options).unwrap()
}

#[test]
fn worked_example() {
    // balance = 1000, price = 100, n_actions = 20, action = 1
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    let trade = scheme.get_trade(&exchange, 1).unwrap();
    assert_eq!(trade.symbol(), "BTC");
    assert_eq!(trade.trade_type(), TradeType::MarketBuy);
    // round(1000 * 0.98 * (1/5) / 100, 8)
    assert_eq!(trade.amount(), 1.96);
    assert_eq!(trade.price(), 100.0);
}

#[test]
fn stateless_scheme_is_pure() {
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    for action in 0..scheme.n_actions() {
        let first = scheme.get_trade(&exchange, action).unwrap();
        let second = scheme.get_trade(&exchange, action).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn trade_type_follows_the_modulus_rule() {
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut discrete = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();
    let mut tracking = TargetStopActions::new(TargetStopOptions::default()).unwrap();

    for action in 0..20 {
        let trade = discrete.get_trade(&exchange, action).unwrap();
        assert_eq!(trade.trade_type(), TradeType::from_action(action));

        // the tracking scheme follows the same rule while its ledger is empty
        let trade = tracking.get_trade(&exchange, action).unwrap();
        assert_eq!(trade.trade_type(), TradeType::from_action(action));
        tracking.reset();
    }
}

#[test]
fn fraction_buckets_from_the_spec_table() {
    // with n_actions = 20: action 1 is a buy at 1/5, action 6 sells 2/5,
    // action 5 buys 2/5
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    let trade = scheme.get_trade(&exchange, 1).unwrap();
    assert!(trade.trade_type().is_buy());
    assert_eq!(trade.amount(), 1.96); // 1000 * 0.98 * 0.2 / 100

    let trade = scheme.get_trade(&exchange, 5).unwrap();
    assert!(trade.trade_type().is_buy());
    assert_eq!(trade.amount(), 3.92); // 1000 * 0.98 * 0.4 / 100

    // same bucket, sell side: fraction of holdings (none held here)
    let trade = scheme.get_trade(&exchange, 6).unwrap();
    assert_eq!(trade.trade_type(), TradeType::LimitSell);
    assert_eq!(trade.amount(), 0.0);
}

#[test]
fn buys_never_break_the_reserve() {
    let balance = 1000.0;
    let exchange = frictionless_exchange(&[100.0], balance);
    let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    for action in 0..scheme.n_actions() {
        let trade = scheme.get_trade(&exchange, action).unwrap();
        if trade.trade_type().is_buy() {
            // within rounding tolerance at instrument precision
            assert!(trade.value() <= balance * 0.98 + 1e-6 * trade.price());
        }
    }
}

#[test]
fn sells_are_sized_from_holdings() {
    let mut exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = DiscreteActions::new(DiscreteActionsOptions::default()).unwrap();

    // hold exactly 2 units, then decode the full-fraction sell (action 19)
    exchange
        .execute_trade(&Trade::from(("BTC", TradeType::MarketBuy, 2.0, 100.0)))
        .unwrap();

    let trade = scheme.get_trade(&exchange, 19).unwrap();
    assert_eq!(trade.trade_type(), TradeType::MarketSell);
    assert_eq!(trade.amount(), 2.0);
}

#[test]
fn queued_exits_close_one_position_per_step() {
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = TargetStopActions::new(TargetStopOptions {
        timeout_steps: 3,
        ..TargetStopOptions::default()
    })
    .unwrap();

    // steps 0..3: open three positions (the flat price fires no target/stop)
    for _ in 0..3 {
        let trade = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(trade.trade_type(), TradeType::MarketBuy);
    }
    assert_eq!(scheme.open_positions().len(), 3);
    let opened_at: Vec<usize> = scheme
        .open_positions()
        .iter()
        .map(|p| p.opened_at_step())
        .collect();
    assert_eq!(opened_at, vec![0, 1, 2]);

    // steps 3..6: every entry has timed out, but exactly one closes per call,
    // oldest first, insertion order preserved for the rest
    for remaining in (0..3).rev() {
        let trade = scheme.get_trade(&exchange, 1).unwrap();
        assert_eq!(trade.trade_type(), TradeType::MarketSell);
        assert_eq!(scheme.open_positions().len(), remaining);

        let opened_at: Vec<usize> = scheme
            .open_positions()
            .iter()
            .map(|p| p.opened_at_step())
            .collect();
        assert_eq!(opened_at, (3 - remaining..3).collect::<Vec<usize>>());
    }
}

#[test]
fn tracking_scheme_reset_is_total() {
    let exchange = frictionless_exchange(&[100.0], 1000.0);
    let mut scheme = TargetStopActions::new(TargetStopOptions::default()).unwrap();

    for action in [1, 0, 1, 2] {
        scheme.get_trade(&exchange, action).unwrap();
    }
    assert!(scheme.current_step() > 0);

    scheme.reset();
    assert_eq!(scheme.current_step(), 0);
    assert!(scheme.open_positions().is_empty());
}

#[test]
fn full_episode_round_trip() {
    // walk a short price series end to end with the tracking scheme,
    // executing everything it emits
    let mut exchange = frictionless_exchange(&[100.0, 104.0, 106.0, 103.0], 1000.0);
    let mut scheme = TargetStopActions::new(TargetStopOptions::default()).unwrap();

    let mut sells = 0;
    while exchange.has_next_observation() {
        exchange.next_observation().unwrap();
        let trade = scheme.get_trade(&exchange, 1).unwrap();
        let filled = exchange.execute_trade(&trade).unwrap();
        assert!(filled.amount() <= trade.amount());
        if trade.trade_type().is_sell() {
            sells += 1;
        }
    }

    // the 5% profit target (entry 100) fires once the price reaches 106
    assert_eq!(sells, 1);
    assert!(exchange.net_worth().unwrap() > 0.0);
    assert_eq!(
        exchange.trades().unwrap().len(),
        exchange.performance().unwrap().len()
    );
}
