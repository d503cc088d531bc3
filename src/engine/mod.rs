//! Core trading engine components.
//!
//! This module provides the fundamental types for practicing trades:
//! - `Trade`: A simulated buy or sell with partial closes.
//! - `Ledger`: Owns the trades and computes unrealized/realized P&L.
//! - `SharedLedger`: A ledger safe to use from several threads.
//! - `Candle` and `Replay`: Historical bars and the stepper walking them.

mod candle;
mod pnl;
mod replay;
mod shared;
mod trade;

use chrono::NaiveDateTime;
use tracing::{debug, trace};

use crate::errors::{Error, Result};

pub use candle::*;
pub use pnl::*;
pub use replay::*;
pub use shared::*;
pub use trade::*;

#[cfg(test)]
mod scenarios;

/// Narrows [`Ledger::list_trades`] without reordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TradeFilter {
    /// Every trade.
    #[default]
    All,
    /// Trades with some quantity still open.
    Open,
    /// Fully closed trades.
    Closed,
}

impl TradeFilter {
    /// Returns `true` if `trade` passes the filter.
    pub fn matches(&self, trade: &Trade) -> bool {
        match self {
            Self::All => true,
            Self::Open => trade.is_open(),
            Self::Closed => !trade.is_open(),
        }
    }
}

/// Result of [`Ledger::close_trade`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    /// Realized P&L of the closed slice only.
    pub realized_pnl: f64,
    /// Snapshot of the trade after the close.
    pub trade: Trade,
}

/// Ledger of simulated trades and their profit and loss.
///
/// Trades are kept in creation order, which is also index order.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    trades: Vec<Trade>,
    // Price of the last mark, if any
    mark_price: Option<f64>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over all the trades.
    pub fn trades(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    /// Returns the trade with the given index.
    pub fn trade(&self, index: usize) -> Result<&Trade> {
        self.trades.get(index).ok_or(Error::TradeNotFound(index))
    }

    /// Returns the price of the last mark.
    pub fn mark_price(&self) -> Option<f64> {
        self.mark_price
    }

    /// Number of trades opened since the last reset.
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Returns `true` when no trade was opened.
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Opens a new trade.
    ///
    /// ### Arguments
    /// * `action` - Direction of the trade.
    /// * `price` - Entry price, positive.
    /// * `quantity` - Opened size, positive.
    /// * `time` - Entry time.
    ///
    /// ### Returns
    /// A snapshot of the created trade, or a validation error.
    ///
    /// If the ledger was already marked, the new trade is marked against the same price.
    ///
    /// ### Example
    /// ```rust
    /// use tradesim::prelude::*;
    /// use chrono::NaiveDateTime;
    ///
    /// let mut ledger = Ledger::new();
    /// let trade = ledger.open_trade(TradeAction::Buy, 1.2, 10.0, NaiveDateTime::default()).unwrap();
    /// assert_eq!(trade.index(), 0);
    /// assert!(trade.is_open());
    /// ```
    pub fn open_trade(&mut self, action: TradeAction, price: f64, quantity: f64, time: NaiveDateTime) -> Result<Trade> {
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::NegZeroPrice(price));
        }
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::NegZeroQuantity(quantity));
        }

        let index = self.trades.len();
        let mut trade = Trade::new(index, action, price, quantity, time);
        if let Some(mark_price) = self.mark_price {
            trade.mark(mark_price);
        }
        debug!(index, %action, price, quantity, "trade opened");
        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Opens a new trade from a textual action (`"buy"` or `"sell"`, any case).
    pub fn open_trade_str(&mut self, action: &str, price: f64, quantity: f64, time: NaiveDateTime) -> Result<Trade> {
        self.open_trade(action.parse()?, price, quantity, time)
    }

    /// Closes some or all of the remaining quantity of a trade.
    ///
    /// ### Arguments
    /// * `index` - Index of the trade.
    /// * `quantity` - Quantity to close, at most the remaining quantity.
    /// * `close_price` - The price at which the slice is closed.
    /// * `time` - Close time, stamped on the trade when it becomes fully closed.
    ///
    /// ### Returns
    /// The realized P&L of this close with the updated trade, or an error.
    /// Nothing changes when an error is returned.
    ///
    /// A close is a market observation: on success every open trade is marked against
    /// `close_price`, which becomes the ledger's mark price.
    ///
    /// ### Example
    /// ```rust
    /// use tradesim::prelude::*;
    /// use chrono::NaiveDateTime;
    ///
    /// let mut ledger = Ledger::new();
    /// let time = NaiveDateTime::default();
    /// ledger.open_trade(TradeAction::Sell, 100.0, 2.0, time).unwrap();
    ///
    /// let outcome = ledger.close_trade(0, 1.0, 90.0, time).unwrap();
    /// assert_eq!(outcome.realized_pnl, 10.0);
    /// assert_eq!(outcome.trade.remaining_quantity(), 1.0);
    /// ```
    pub fn close_trade(
        &mut self,
        index: usize,
        quantity: f64,
        close_price: f64,
        time: NaiveDateTime,
    ) -> Result<CloseOutcome> {
        let trade = self.trades.get_mut(index).ok_or(Error::TradeNotFound(index))?;
        let realized_pnl = trade.close(quantity, close_price, time)?;
        debug!(
            index,
            quantity,
            close_price,
            realized = realized_pnl,
            remaining = trade.remaining_quantity(),
            "trade closed"
        );
        self.mark_to_market(close_price);
        Ok(CloseOutcome {
            realized_pnl,
            trade: self.trades[index].clone(),
        })
    }

    /// Closes everything still open on a trade.
    pub fn close_trade_fully(&mut self, index: usize, close_price: f64, time: NaiveDateTime) -> Result<CloseOutcome> {
        let remaining = self.trade(index)?.remaining_quantity();
        if remaining <= 0.0 {
            return Err(Error::TradeClosed(index));
        }
        self.close_trade(index, remaining, close_price, time)
    }

    /// Marks every open trade against `current_price` and returns the summary.
    ///
    /// Calling it twice with the same price gives the same result. Realized P&L is untouched.
    pub fn mark_to_market(&mut self, current_price: f64) -> PnlSummary {
        for trade in self.trades.iter_mut() {
            trade.mark(current_price);
        }
        self.mark_price = Some(current_price);
        let summary = self.summary();
        trace!(current_price, %summary, "marked to market");
        summary
    }

    /// Returns the aggregate P&L as of the last mark.
    pub fn summary(&self) -> PnlSummary {
        self.trades.iter().collect()
    }

    /// Returns the trades passing `filter`, in creation order.
    pub fn list_trades(&self, filter: TradeFilter) -> Vec<Trade> {
        self.trades.iter().filter(|t| filter.matches(t)).cloned().collect()
    }

    /// Drops every trade and the mark price. Indexes start again from zero.
    pub fn reset(&mut self) {
        debug!(trades = self.trades.len(), "ledger reset");
        self.trades = Vec::new();
        self.mark_price = None;
    }
}
