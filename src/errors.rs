/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad class of an [`Error`], used by callers that only need to decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input. Nothing was mutated.
    Validation,
    /// The requested trade, bar or price does not exist (or no longer accepts the operation).
    NotFound,
    /// Historical data could not be read or decoded.
    Data,
    /// Internal failure, likely a bug.
    Internal,
}

/// Errors returned by the ledger, the replay and the history loader.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The trade action is neither `buy` nor `sell`.
    #[error("Invalid trade action: expected `buy` or `sell` (got: {0:?})")]
    InvalidAction(String),

    /// A price must be positive and finite.
    #[error("Price must be positive and finite (got: {0})")]
    NegZeroPrice(f64),

    /// A quantity must be positive and finite.
    #[error("Quantity must be positive and finite (got: {0})")]
    NegZeroQuantity(f64),

    /// The close quantity is greater than what is still open on the trade.
    #[error("Cannot close {requested}: only {remaining} remains open")]
    OverClose {
        /// Quantity asked for.
        requested: f64,
        /// Quantity still open.
        remaining: f64,
    },

    /// No trade was ever created with this index.
    #[error("Trade #{0} not found")]
    TradeNotFound(usize),

    /// The trade has no remaining quantity.
    #[error("Trade #{0} is already closed")]
    TradeClosed(usize),

    /// The timeframe (in minutes) has no history file.
    #[error("Unsupported timeframe: {0} minutes (expected 1, 5, 15, 30 or 60)")]
    InvalidTimeframe(u32),

    /// A session setting expressed in pips is not positive.
    #[error("Pip setting `{name}` must be positive and finite (got: {value})")]
    InvalidPipSetting {
        /// Name of the setting.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A candle has inconsistent prices.
    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    /// The candle data provided is empty. Replaying requires at least one candle.
    #[error("Candle data is empty: replaying requires at least one candle")]
    CandleDataEmpty,

    /// The replay cursor went past the last candle.
    #[error("No more data: bar {0} is past the end of the history")]
    NoMoreData(usize),

    /// No bar has been stepped yet, so there is no market price to fall back on.
    #[error("No current price: step the replay or provide a price")]
    NoCurrentPrice,

    /// A history row could not be decoded.
    #[error("Parse error at line {line}: {reason}")]
    Parse {
        /// One-based line number in the history file.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// The shared ledger lock was poisoned by a panicking holder.
    #[error("Ledger lock poisoned (internal error)")]
    LockPoisoned,

    /// I/O error occurred.
    // history.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAction(_)
            | Self::NegZeroPrice(_)
            | Self::NegZeroQuantity(_)
            | Self::OverClose { .. }
            | Self::InvalidTimeframe(_)
            | Self::InvalidPipSetting { .. }
            | Self::InvalidCandle(_) => ErrorKind::Validation,
            Self::TradeNotFound(_) | Self::TradeClosed(_) | Self::NoMoreData(_) | Self::NoCurrentPrice => {
                ErrorKind::NotFound
            }
            Self::CandleDataEmpty | Self::Parse { .. } | Self::IoError(_) => ErrorKind::Data,
            #[cfg(feature = "serde")]
            Self::JsonError(_) => ErrorKind::Data,
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
#[test]
fn error_kinds() {
    assert_eq!(Error::InvalidAction("hold".into()).kind(), ErrorKind::Validation);
    assert_eq!(
        Error::OverClose {
            requested: 2.0,
            remaining: 1.0
        }
        .kind(),
        ErrorKind::Validation
    );
    assert_eq!(Error::TradeNotFound(3).kind(), ErrorKind::NotFound);
    assert_eq!(Error::TradeClosed(0).kind(), ErrorKind::NotFound);
    assert_eq!(Error::CandleDataEmpty.kind(), ErrorKind::Data);
    assert_eq!(Error::LockPoisoned.kind(), ErrorKind::Internal);
}

#[cfg(test)]
#[test]
fn error_messages() {
    assert_eq!(Error::TradeNotFound(7).to_string(), "Trade #7 not found");
    assert_eq!(
        Error::OverClose {
            requested: 5.0,
            remaining: 4.0
        }
        .to_string(),
        "Cannot close 5: only 4 remains open"
    );
}
