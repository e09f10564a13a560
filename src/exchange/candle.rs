use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use chrono::serde::ts_milliseconds;
#[cfg(feature = "serde")]
use serde::Deserialize;

/// One OHLCV row of market data.
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[derive(Debug, Clone)]
pub struct Candle {
    #[cfg_attr(feature = "serde", serde(alias = "open_price"))]
    open: f64,
    #[cfg_attr(feature = "serde", serde(alias = "high_price"))]
    high: f64,
    #[cfg_attr(feature = "serde", serde(alias = "low_price"))]
    low: f64,
    #[cfg_attr(feature = "serde", serde(alias = "close_price"))]
    close: f64,
    volume: f64,
    #[cfg_attr(feature = "serde", serde(with = "ts_milliseconds"))]
    open_time: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(with = "ts_milliseconds"))]
    close_time: DateTime<Utc>,
}

impl From<(f64, f64, f64, f64, f64)> for Candle {
    fn from((open, high, low, close, volume): (f64, f64, f64, f64, f64)) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            open_time: DateTime::default(),
            close_time: DateTime::default(),
        }
    }
}

type TimedCandle = (f64, f64, f64, f64, f64, DateTime<Utc>, DateTime<Utc>);
impl From<TimedCandle> for Candle {
    fn from((open, high, low, close, volume, open_time, close_time): TimedCandle) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            open_time,
            close_time,
        }
    }
}

impl Candle {
    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    pub fn close_time(&self) -> DateTime<Utc> {
        self.close_time
    }
}
