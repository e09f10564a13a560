#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The four order kinds an agent can request.
///
/// The enumeration order is load-bearing: discrete action codes are decoded
/// with `action % 4` in exactly this order, so reordering the variants changes
/// decoding semantics and must be versioned explicitly.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeType {
    /// Buy at a specified price or better.
    LimitBuy,
    /// Buy immediately at the current price.
    MarketBuy,
    /// Sell at a specified price or better.
    LimitSell,
    /// Sell immediately at the current price.
    MarketSell,
}

impl TradeType {
    /// Number of trade kinds. Used as the modulus when decoding action codes.
    pub const CARDINALITY: usize = 4;

    /// Decodes the trade type from a discrete action code (`action % 4`,
    /// in enumeration order).
    pub fn from_action(action: usize) -> Self {
        match action % Self::CARDINALITY {
            0 => Self::LimitBuy,
            1 => Self::MarketBuy,
            2 => Self::LimitSell,
            _ => Self::MarketSell,
        }
    }

    /// Whether this is a buy-side order.
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::LimitBuy | Self::MarketBuy)
    }

    /// Whether this is a sell-side order. Together with [`is_buy`](Self::is_buy)
    /// this partitions the set exactly.
    pub fn is_sell(&self) -> bool {
        !self.is_buy()
    }
}

/// An intended or executed transaction.
///
/// Immutable once constructed. A scheme creates one per `get_trade` call; the
/// exchange consumes it in `execute_trade` and returns a new `Trade`
/// describing the actual fill.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    symbol: String,
    trade_type: TradeType,
    amount: f64,
    price: f64,
}

impl From<(&str, TradeType, f64, f64)> for Trade {
    fn from((symbol, trade_type, amount, price): (&str, TradeType, f64, f64)) -> Self {
        Self {
            symbol: symbol.to_string(),
            trade_type,
            amount,
            price,
        }
    }
}

impl Trade {
    /// Returns the exchange symbol of the traded instrument.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the order kind.
    pub fn trade_type(&self) -> TradeType {
        self.trade_type
    }

    /// Returns the instrument amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the price in base-instrument units.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the total value of the trade (`amount * price`).
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

#[cfg(test)]
#[test]
fn decode_follows_enumeration_order() {
    use TradeType::*;

    assert_eq!(TradeType::from_action(0), LimitBuy);
    assert_eq!(TradeType::from_action(1), MarketBuy);
    assert_eq!(TradeType::from_action(2), LimitSell);
    assert_eq!(TradeType::from_action(3), MarketSell);
    // the pattern repeats every CARDINALITY codes
    assert_eq!(TradeType::from_action(4), LimitBuy);
    assert_eq!(TradeType::from_action(19), MarketSell);
}

#[cfg(test)]
#[test]
fn buy_and_sell_partition_the_set() {
    for action in 0..TradeType::CARDINALITY {
        let trade_type = TradeType::from_action(action);
        assert_ne!(trade_type.is_buy(), trade_type.is_sell());
    }
}

#[cfg(test)]
#[test]
fn create_trade() {
    let trade = Trade::from(("BTC", TradeType::MarketBuy, 2.0, 100.0));

    assert_eq!(trade.symbol(), "BTC");
    assert_eq!(trade.trade_type(), TradeType::MarketBuy);
    assert_eq!(trade.amount(), 2.0);
    assert_eq!(trade.price(), 100.0);
    assert_eq!(trade.value(), 200.0);
}

#[cfg(test)]
#[test]
fn trade_equality_is_structural() {
    let trade1 = Trade::from(("BTC", TradeType::LimitSell, 1.0, 100.0));
    let trade2 = Trade::from(("BTC", TradeType::LimitSell, 1.0, 100.0));
    assert_eq!(trade1, trade2);
}
