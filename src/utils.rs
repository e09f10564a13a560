use chrono::{DateTime, Duration};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::exchange::Candle;

/// Generates a deterministic random-walk candle series.
///
/// Useful for demos and quick experiments: the same seed always yields the
/// same series.
///
/// ### Arguments
/// * `n` - Number of candles to generate.
/// * `seed` - RNG seed.
/// * `base_price` - Price the walk starts from.
pub fn sample_candles(n: usize, seed: u64, base_price: f64) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut open_time = DateTime::default();
    let mut open = base_price;

    (0..n)
        .map(|_| {
            let drift = rng.random_range(-1.0..1.0);
            let close = (open + drift).max(0.01);
            let high = open.max(close) + rng.random_range(0.0..0.5);
            let low = (open.min(close) - rng.random_range(0.0..0.5)).max(0.01);
            let volume = rng.random_range(100.0..1000.0);
            let close_time = open_time + Duration::hours(1);

            let candle = Candle::from((open, high, low, close, volume, open_time, close_time));
            open_time = close_time;
            open = close;
            candle
        })
        .collect()
}

#[cfg(feature = "serde")]
/// Reads a JSON candle array from `filepath`.
///
/// Accepts both the crate's own field names and the `*_price` aliases common
/// in exchange dumps.
pub fn candles_from_file(filepath: std::path::PathBuf) -> crate::errors::Result<Vec<Candle>> {
    use crate::errors::Error;
    use std::{fs::File, io::BufReader};

    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(Error::from)
}

#[cfg(test)]
#[test]
fn sample_candles_are_deterministic_and_valid() {
    let first = sample_candles(50, 42, 100.0);
    let second = sample_candles(50, 42, 100.0);

    assert_eq!(first.len(), 50);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.close(), b.close());
        assert!(a.close() > 0.0);
        assert!(a.low() <= a.open().min(a.close()));
        assert!(a.high() >= a.open().max(a.close()));
        assert!(a.open_time() < a.close_time());
    }
}
