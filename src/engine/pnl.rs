use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Trade;

/// Aggregate profit and loss of a ledger.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PnlSummary {
    /// Sum of the unrealized P&L of open trades.
    pub unrealized: f64,
    /// Sum of the realized P&L of all trades.
    pub realized: f64,
    /// `unrealized + realized`.
    pub total: f64,
}

impl PnlSummary {
    /// Creates a summary, deriving the total.
    pub fn new(unrealized: f64, realized: f64) -> Self {
        Self {
            unrealized,
            realized,
            total: unrealized + realized,
        }
    }
}

impl<'t> FromIterator<&'t Trade> for PnlSummary {
    fn from_iter<I: IntoIterator<Item = &'t Trade>>(iter: I) -> Self {
        let (unrealized, realized) = iter.into_iter().fold((0.0, 0.0), |(unrealized, realized), trade| {
            let unrealized = if trade.is_open() {
                unrealized + trade.profit_loss()
            } else {
                unrealized
            };
            (unrealized, realized + trade.realized_profit_loss())
        });
        Self::new(unrealized, realized)
    }
}

impl fmt::Display for PnlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrealized {:.2} | realized {:.2} | total {:.2}",
            self.unrealized, self.realized, self.total
        )
    }
}

#[cfg(test)]
#[test]
fn summary_total() {
    let summary = PnlSummary::new(1.5, -0.5);
    assert_eq!(summary.total, 1.0);
    assert_eq!(summary.to_string(), "unrealized 1.50 | realized -0.50 | total 1.00");
}

#[cfg(test)]
#[test]
fn empty_summary() {
    let summary = std::iter::empty::<&Trade>().collect::<PnlSummary>();
    assert_eq!(summary, PnlSummary::default());
}
