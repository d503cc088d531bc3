//! # tradesim: practice trading on historical bars
//!
//! **tradesim** is the engine behind a trading practice tool: step through historical candles one bar
//! at a time, open and close simulated trades, and follow the running profit and loss.
//!
//! ## Core Components
//! | Component        | Description                                                                          |
//! |------------------|--------------------------------------------------------------------------------------|
//! | **`Trade`**      | A simulated buy or sell with partial closes and realized/unrealized P&L.             |
//! | **`Ledger`**     | Owns the trades of a session and computes the aggregate P&L.                         |
//! | **`SharedLedger`** | The same ledger behind a lock, for hosts serving concurrent requests.              |
//! | **`Replay`**     | Steps through historical candles.                                                    |
//! | **`Session`**    | Wires the replay's prices into the ledger, with the usual UI defaults.               |
//!
//! ## P&L Rules
//! | Figure         | Buy                                        | Sell                                       |
//! |----------------|--------------------------------------------|--------------------------------------------|
//! | **Unrealized** | `(current - entry) × remaining`            | `(entry - current) × remaining`            |
//! | **Realized**   | `(close - entry) × closed`, per close      | `(entry - close) × closed`, per close      |
//!
//! Each partial close is priced on its own; there is no average-price blending.
//!
//! ## Getting Started
//! ```rust
//! use tradesim::prelude::*;
//! use chrono::NaiveDateTime;
//!
//! let mut ledger = Ledger::new();
//! let time = NaiveDateTime::default();
//!
//! ledger.open_trade(TradeAction::Buy, 100.0, 10.0, time).unwrap();
//! let summary = ledger.mark_to_market(105.0);
//! assert_eq!(summary.unrealized, 50.0);
//!
//! let outcome = ledger.close_trade(0, 4.0, 110.0, time).unwrap();
//! assert_eq!(outcome.realized_pnl, 40.0);
//! assert_eq!(outcome.trade.remaining_quantity(), 6.0);
//! ```
//!
//! ## Error Handling
//! Every operation either applies fully or returns an [`errors::Error`] and changes nothing.
//! [`errors::Error::kind`] sorts errors into validation, not-found, data and internal failures.
//!
//! ## Logging
//! The crate logs through [`tracing`]; install any subscriber to see ledger activity.
#![warn(missing_docs)]

/// Core trading engine components: trades, ledger, candles and replay.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Session settings.
pub mod config;

/// Historical candle files and timeframes.
pub mod history;

/// A replay session driving the ledger.
pub mod session;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::history::*;
    pub use crate::session::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for pip-based price offsets.
///
/// A pip is the smallest quoted increment of a price (0.0001 for most currency pairs).
pub trait PipCalculus<Rhs = Self> {
    /// Adds a number of pips to the price.
    ///
    /// ### Arguments
    /// * `pips` - The number of pips to add.
    /// * `pip_size` - The price value of one pip.
    fn add_pips(self, pips: Rhs, pip_size: Rhs) -> Self;

    /// Subtracts a number of pips from the price.
    fn sub_pips(self, pips: Rhs, pip_size: Rhs) -> Self;

    /// Signed distance from this price to `other`, in pips.
    fn pips_to(self, other: Self, pip_size: Rhs) -> Self;
}

impl PipCalculus for f64 {
    fn add_pips(self, pips: Self, pip_size: Self) -> Self {
        self.add(pips.mul(pip_size))
    }

    fn sub_pips(self, pips: Self, pip_size: Self) -> Self {
        self.sub(pips.mul(pip_size))
    }

    fn pips_to(self, other: Self, pip_size: Self) -> Self {
        other.sub(self).div(pip_size)
    }
}
