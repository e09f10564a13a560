pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The exchange adapter does not provide the named capability. This is a
    /// programmer error (a missing override, not a market condition) and must
    /// propagate to the caller.
    #[error("Exchange capability not implemented: {0}")]
    NotImplemented(&'static str),

    /// A scheme or exchange was constructed with invalid settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A quote or trade price was zero, negative, or not finite.
    #[error("Price must be positive and finite (got: {0})")]
    NonPositivePrice(f64),

    /// The initial or current balance is not positive.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The candle data provided is empty. A simulated exchange requires at least one candle.
    #[error("Candle data is empty: a simulated exchange requires at least one candle")]
    CandleDataEmpty,

    /// The observation source has no more rows. Reset the exchange to continue.
    #[error("Observation source exhausted")]
    ObservationsExhausted,

    /// I/O error occurred.
    // utils.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
