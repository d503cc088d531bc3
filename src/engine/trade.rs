use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

use crate::errors::{Error, Result};

/// Relative tolerance on quantities. Two quantities of a trade are equal when they differ by less
/// than `QUANTITY_EPSILON` times the opened quantity, so float dust never leaves a trade open.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Direction of the trade when it was opened.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    /// Long: profits when the price goes up.
    Buy,
    /// Short: profits when the price goes down.
    Sell,
}

impl TradeAction {
    /// Profit or loss of `quantity` entered at `entry_price` and valued at `price`.
    pub fn pnl(&self, entry_price: f64, price: f64, quantity: f64) -> f64 {
        match self {
            Self::Buy => (price - entry_price) * quantity,
            Self::Sell => (entry_price - price) * quantity,
        }
    }
}

impl FromStr for TradeAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(Error::InvalidAction(s.to_owned())),
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// Lifecycle stage of a trade. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    /// Nothing closed yet.
    Open,
    /// Some quantity closed, some still open.
    PartiallyClosed,
    /// No remaining quantity.
    Closed,
}

/// A simulated trade owned by the [`Ledger`](super::Ledger).
///
/// Trades only leave the ledger as snapshots: they serialize (with a derived `isOpen`) but never
/// deserialize, so a trade always satisfies `0 <= remaining_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    index: usize,
    action: TradeAction,
    entry_price: f64,
    entry_time: NaiveDateTime,
    quantity: f64,
    remaining_quantity: f64,
    close_price: Option<f64>,
    close_time: Option<NaiveDateTime>,
    // Unrealized P&L on the remaining quantity
    profit_loss: f64,
    // Cumulative P&L locked in by closes
    realized_profit_loss: f64,
}

impl Trade {
    /// Creates an open trade. Inputs are validated by the ledger.
    pub(crate) fn new(index: usize, action: TradeAction, entry_price: f64, quantity: f64, entry_time: NaiveDateTime) -> Self {
        Self {
            index,
            action,
            entry_price,
            entry_time,
            quantity,
            remaining_quantity: quantity,
            close_price: None,
            close_time: None,
            profit_loss: 0.0,
            realized_profit_loss: 0.0,
        }
    }

    /// Sequential index assigned by the ledger.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Direction of the trade.
    pub fn action(&self) -> TradeAction {
        self.action
    }

    /// Price the trade was opened at.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Time the trade was opened at.
    pub fn entry_time(&self) -> NaiveDateTime {
        self.entry_time
    }

    /// Returns the originally opened quantity.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Quantity still open.
    pub fn remaining_quantity(&self) -> f64 {
        self.remaining_quantity
    }

    /// Returns `true` while some quantity remains open.
    pub fn is_open(&self) -> bool {
        self.remaining_quantity > 0.0
    }

    /// Lifecycle stage derived from the quantities.
    pub fn status(&self) -> TradeStatus {
        if !self.is_open() {
            TradeStatus::Closed
        } else if self.remaining_quantity < self.quantity {
            TradeStatus::PartiallyClosed
        } else {
            TradeStatus::Open
        }
    }

    /// Price of the close that emptied the trade.
    pub fn close_price(&self) -> Option<f64> {
        self.close_price
    }

    /// Time of the close that emptied the trade.
    pub fn close_time(&self) -> Option<NaiveDateTime> {
        self.close_time
    }

    /// Returns the unrealized P&L of the remaining quantity at the last mark.
    pub fn profit_loss(&self) -> f64 {
        self.profit_loss
    }

    /// Cumulative P&L locked in by closes.
    pub fn realized_profit_loss(&self) -> f64 {
        self.realized_profit_loss
    }

    /// Estimates the P&L of the remaining quantity at `price` without marking.
    pub fn estimate_pnl(&self, price: f64) -> f64 {
        self.action.pnl(self.entry_price, price, self.remaining_quantity)
    }

    /// Marks the remaining quantity against `price`. Closed trades are left at zero.
    pub(crate) fn mark(&mut self, price: f64) -> f64 {
        if self.is_open() {
            self.profit_loss = self.estimate_pnl(price);
        }
        self.profit_loss
    }

    // Float dust tolerated on this trade's quantities
    fn dust(&self) -> f64 {
        QUANTITY_EPSILON * self.quantity
    }

    /// Checks that `quantity` can be closed at `price` and returns the quantity actually taken.
    pub(crate) fn check_close(&self, quantity: f64, price: f64) -> Result<f64> {
        if !self.is_open() {
            return Err(Error::TradeClosed(self.index));
        }
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::NegZeroQuantity(quantity));
        }
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::NegZeroPrice(price));
        }
        if quantity - self.remaining_quantity > self.dust() {
            return Err(Error::OverClose {
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }
        Ok(quantity.min(self.remaining_quantity))
    }

    /// Closes `quantity` at `price` and returns the realized P&L of that slice.
    ///
    /// Nothing is mutated when validation fails.
    pub(crate) fn close(&mut self, quantity: f64, price: f64, time: NaiveDateTime) -> Result<f64> {
        let quantity = self.check_close(quantity, price)?;
        let realized = self.action.pnl(self.entry_price, price, quantity);
        self.realized_profit_loss += realized;

        let remaining = self.remaining_quantity - quantity;
        if remaining <= self.dust() {
            self.remaining_quantity = 0.0;
            self.profit_loss = 0.0;
            self.close_price = Some(price);
            self.close_time = Some(time);
        } else {
            self.remaining_quantity = remaining;
            self.mark(price);
        }

        Ok(realized)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Trade {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Trade", 11)?;
        state.serialize_field("index", &self.index)?;
        state.serialize_field("action", &self.action)?;
        state.serialize_field("entryPrice", &self.entry_price)?;
        state.serialize_field("entryTime", &self.entry_time)?;
        state.serialize_field("quantity", &self.quantity)?;
        state.serialize_field("remainingQuantity", &self.remaining_quantity)?;
        state.serialize_field("isOpen", &self.is_open())?;
        state.serialize_field("closePrice", &self.close_price)?;
        state.serialize_field("closeTime", &self.close_time)?;
        state.serialize_field("profitLoss", &self.profit_loss)?;
        state.serialize_field("realizedProfitLoss", &self.realized_profit_loss)?;
        state.end()
    }
}

#[cfg(test)]
fn at(hour: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

#[cfg(test)]
#[test]
fn parse_action() {
    assert_eq!("buy".parse::<TradeAction>().unwrap(), TradeAction::Buy);
    assert_eq!(" SELL ".parse::<TradeAction>().unwrap(), TradeAction::Sell);
    assert!(matches!("hold".parse::<TradeAction>(), Err(Error::InvalidAction(_))));
    assert!(matches!("".parse::<TradeAction>(), Err(Error::InvalidAction(_))));
}

#[cfg(test)]
#[test]
fn directional_pnl() {
    assert_eq!(TradeAction::Buy.pnl(100.0, 110.0, 2.0), 20.0);
    assert_eq!(TradeAction::Sell.pnl(100.0, 110.0, 2.0), -20.0);
    assert_eq!(TradeAction::Sell.pnl(100.0, 90.0, 1.0), 10.0);
}

#[cfg(test)]
#[test]
fn new_trade_is_open() {
    let trade = Trade::new(0, TradeAction::Buy, 100.0, 3.0, at(0));
    assert!(trade.is_open());
    assert_eq!(trade.status(), TradeStatus::Open);
    assert_eq!(trade.remaining_quantity(), 3.0);
    assert!(trade.close_price().is_none());
    assert!(trade.close_time().is_none());
}

#[cfg(test)]
#[test]
fn mark_open_trade() {
    let mut trade = Trade::new(0, TradeAction::Sell, 100.0, 2.0, at(0));
    assert_eq!(trade.mark(95.0), 10.0);
    assert_eq!(trade.profit_loss(), 10.0);
    assert_eq!(trade.realized_profit_loss(), 0.0);
}

#[cfg(test)]
#[test]
fn partial_then_full_close() {
    let mut trade = Trade::new(0, TradeAction::Buy, 100.0, 4.0, at(0));

    let realized = trade.close(1.0, 110.0, at(1)).unwrap();
    assert_eq!(realized, 10.0);
    assert_eq!(trade.status(), TradeStatus::PartiallyClosed);
    assert_eq!(trade.remaining_quantity(), 3.0);
    // remaining quantity is re-marked at the close price
    assert_eq!(trade.profit_loss(), 30.0);
    assert!(trade.close_price().is_none());

    let realized = trade.close(3.0, 90.0, at(2)).unwrap();
    assert_eq!(realized, -30.0);
    assert_eq!(trade.status(), TradeStatus::Closed);
    assert_eq!(trade.realized_profit_loss(), -20.0);
    assert_eq!(trade.profit_loss(), 0.0);
    assert_eq!(trade.close_price(), Some(90.0));
    assert_eq!(trade.close_time(), Some(at(2)));
}

#[cfg(test)]
#[test]
fn close_absorbs_float_dust() {
    let mut trade = Trade::new(0, TradeAction::Buy, 1.0, 0.3, at(0));
    trade.close(0.1, 1.0, at(1)).unwrap();
    trade.close(0.1, 1.0, at(1)).unwrap();
    // 0.3 - 0.1 - 0.1 is not exactly 0.1
    trade.close(0.1, 1.0, at(2)).unwrap();
    assert!(!trade.is_open());
    assert_eq!(trade.remaining_quantity(), 0.0);
}

#[cfg(test)]
#[test]
fn invalid_close_keeps_state() {
    let mut trade = Trade::new(4, TradeAction::Buy, 100.0, 1.0, at(0));
    let before = trade.clone();

    assert!(matches!(trade.close(2.0, 100.0, at(1)), Err(Error::OverClose { .. })));
    assert!(matches!(trade.close(0.0, 100.0, at(1)), Err(Error::NegZeroQuantity(_))));
    assert!(matches!(trade.close(1.0, -1.0, at(1)), Err(Error::NegZeroPrice(_))));
    assert!(matches!(trade.close(1.0, f64::NAN, at(1)), Err(Error::NegZeroPrice(_))));
    assert_eq!(trade, before);

    trade.close(1.0, 100.0, at(1)).unwrap();
    assert!(matches!(trade.close(1.0, 100.0, at(2)), Err(Error::TradeClosed(4))));
}

#[cfg(test)]
#[test]
fn tiny_quantities_are_not_dust() {
    // over-closing a tiny trade is still rejected
    let mut tiny = Trade::new(0, TradeAction::Buy, 1.0, 5e-10, at(0));
    assert!(matches!(tiny.close(1e-9, 2.0, at(1)), Err(Error::OverClose { .. })));
    assert!(tiny.is_open());

    // a tiny remainder stays open
    let mut small = Trade::new(1, TradeAction::Buy, 1.0, 1.5e-9, at(0));
    small.close(1e-9, 2.0, at(1)).unwrap();
    assert!(small.is_open());
    assert!((small.remaining_quantity() - 5e-10).abs() < 1e-20);

    let realized = small.close(small.remaining_quantity(), 2.0, at(2)).unwrap();
    assert!((realized - 5e-10).abs() < 1e-20);
    assert!((small.realized_profit_loss() - 1.5e-9).abs() < 1e-20);
    assert!(!small.is_open());
}

#[cfg(test)]
#[test]
fn closed_trade_ignores_marks() {
    let mut trade = Trade::new(0, TradeAction::Buy, 100.0, 1.0, at(0));
    trade.close(1.0, 105.0, at(1)).unwrap();
    assert_eq!(trade.mark(200.0), 0.0);
    assert_eq!(trade.realized_profit_loss(), 5.0);
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn serialized_trade_derives_is_open() {
    let mut trade = Trade::new(2, TradeAction::Sell, 1.2, 2.0, at(0));
    let json = serde_json::to_value(&trade).unwrap();
    assert_eq!(json["isOpen"], true);
    assert_eq!(json["action"], "sell");
    assert_eq!(json["remainingQuantity"], 2.0);
    assert!(json["closePrice"].is_null());

    trade.close(2.0, 1.1, at(1)).unwrap();
    let json = serde_json::to_value(&trade).unwrap();
    assert_eq!(json["isOpen"], false);
    assert_eq!(json["closePrice"], 1.1);
}
