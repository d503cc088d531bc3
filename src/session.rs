//! A replay session: one ledger, one history, one current bar.
//!
//! The session is what a presentation layer talks to. It steps the replay, marks the ledger
//! against each new close and fills in the defaults a trading form leaves blank: a missing
//! price means the current close, a missing close quantity means everything still open.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::PipCalculus;
use crate::config::SessionConfig;
use crate::engine::{Candle, CloseOutcome, Ledger, PnlSummary, Replay, Trade, TradeAction, TradeFilter};
use crate::errors::{Error, Result};
use crate::history;

/// What a step through the history produced.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// The bar just stepped.
    pub candle: Candle,
    /// Index of the bar the next step returns.
    pub next_index: usize,
    /// Every trade, marked against the bar's close.
    pub trades: Vec<Trade>,
    /// Aggregate P&L at the bar's close.
    pub summary: PnlSummary,
    /// The bar's close.
    pub current_price: f64,
}

/// Snapshot of the account.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Every trade in creation order.
    pub trades: Vec<Trade>,
    /// Aggregate P&L as of the last mark.
    pub summary: PnlSummary,
    /// Close of the current bar.
    pub current_price: Option<f64>,
}

/// Result of [`Session::close_trade`].
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClose {
    /// The ledger's close outcome.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub outcome: CloseOutcome,
    /// Aggregate P&L, marked at the close price.
    pub summary: PnlSummary,
}

/// Guide lines drawn around an entry price.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Line above the entry.
    pub upper: f64,
    /// Line below the entry.
    pub lower: f64,
}

/// A trading practice session over one history.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    replay: Replay,
    ledger: Ledger,
}

impl Session {
    /// Creates a session over `data`.
    ///
    /// ### Example
    /// ```rust
    /// use tradesim::prelude::*;
    /// use chrono::NaiveDateTime;
    ///
    /// let candle = CandleBuilder::builder()
    ///     .time(NaiveDateTime::default())
    ///     .open(1.1000)
    ///     .high(1.1020)
    ///     .low(1.0990)
    ///     .close(1.1010)
    ///     .build()
    ///     .unwrap();
    ///
    /// let mut session = Session::new(SessionConfig::default(), vec![candle]).unwrap();
    /// let tick = session.step().unwrap();
    /// assert_eq!(tick.current_price, 1.1010);
    ///
    /// // no price given: the trade enters at the current close
    /// let trade = session.open_trade(TradeAction::Buy, None, 1000.0).unwrap();
    /// assert_eq!(trade.entry_price(), 1.1010);
    /// ```
    pub fn new(config: SessionConfig, data: impl Into<Arc<[Candle]>>) -> Result<Self> {
        config.validate()?;
        let replay = Replay::new(data.into())?;
        info!(symbol = %config.symbol, timeframe = %config.timeframe, bars = replay.len(), "session started");
        Ok(Self {
            config,
            replay,
            ledger: Ledger::new(),
        })
    }

    /// Creates a session from the history file selected by `config`.
    pub fn load(config: SessionConfig) -> Result<Self> {
        let data = history::load_session_data(&config)?;
        Self::new(config, data)
    }

    /// Returns the session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the ledger, marked as of the last step or close.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the replay cursor.
    pub fn replay(&self) -> &Replay {
        &self.replay
    }

    // The last stepped bar, or the first bar before any step
    fn current_bar(&self) -> Option<&Candle> {
        self.replay.current().or_else(|| self.replay.candles().next())
    }

    /// Close of the current bar. Before the first step this is the first bar's close.
    pub fn current_price(&self) -> Option<f64> {
        self.current_bar().map(Candle::close)
    }

    fn price_or_current(&self, price: Option<f64>) -> Result<f64> {
        price.or_else(|| self.current_price()).ok_or(Error::NoCurrentPrice)
    }

    fn tick(&mut self, candle: Candle) -> Tick {
        let current_price = candle.close();
        let summary = self.ledger.mark_to_market(current_price);
        Tick {
            candle,
            next_index: self.replay.next_index(),
            trades: self.ledger.list_trades(TradeFilter::All),
            summary,
            current_price,
        }
    }

    /// Steps to the next bar and marks the ledger against its close.
    pub fn step(&mut self) -> Result<Tick> {
        let candle = *self.replay.step()?;
        Ok(self.tick(candle))
    }

    /// Steps to bar `index`, skipping or revisiting bars as needed.
    pub fn step_to(&mut self, index: usize) -> Result<Tick> {
        self.replay.seek(index)?;
        self.step()
    }

    /// Opens a trade at `price`, or at the current close when `price` is `None`.
    ///
    /// The entry time is the current bar's time (or the first bar's before any step).
    pub fn open_trade(&mut self, action: TradeAction, price: Option<f64>, quantity: f64) -> Result<Trade> {
        let price = self.price_or_current(price)?;
        let time = self.current_bar().map(Candle::time).ok_or(Error::CandleDataEmpty)?;
        self.ledger.open_trade(action, price, quantity, time)
    }

    /// Closes `quantity` of a trade (everything remaining when `None`) at `close_price`
    /// (the current close when `None`). The ledger is marked at that price.
    pub fn close_trade(&mut self, index: usize, quantity: Option<f64>, close_price: Option<f64>) -> Result<SessionClose> {
        let close_price = self.price_or_current(close_price)?;
        let quantity = match quantity {
            Some(quantity) => quantity,
            None => {
                let trade = self.ledger.trade(index)?;
                if !trade.is_open() {
                    return Err(Error::TradeClosed(index));
                }
                trade.remaining_quantity()
            }
        };
        let time = self.current_bar().map(Candle::time).ok_or(Error::CandleDataEmpty)?;

        let outcome = self.ledger.close_trade(index, quantity, close_price, time)?;
        Ok(SessionClose {
            outcome,
            summary: self.ledger.summary(),
        })
    }

    /// Returns every trade with the aggregate P&L.
    pub fn account(&self) -> Account {
        Account {
            trades: self.ledger.list_trades(TradeFilter::All),
            summary: self.ledger.summary(),
            current_price: self.current_price(),
        }
    }

    /// Guide lines around `price` for a trade in direction `action`.
    ///
    /// A buy gets its profit line above and its loss line below; a sell is mirrored.
    pub fn projection(&self, action: TradeAction, price: f64) -> Projection {
        let SessionConfig {
            pip_size,
            take_profit_pips,
            stop_loss_pips,
            ..
        } = self.config;
        match action {
            TradeAction::Buy => Projection {
                upper: price.add_pips(take_profit_pips, pip_size),
                lower: price.sub_pips(stop_loss_pips, pip_size),
            },
            TradeAction::Sell => Projection {
                upper: price.add_pips(stop_loss_pips, pip_size),
                lower: price.sub_pips(take_profit_pips, pip_size),
            },
        }
    }

    /// Ends the current practice run: drops every trade and rewinds the history.
    pub fn reset(&mut self) {
        debug!(symbol = %self.config.symbol, "session reset");
        self.ledger.reset();
        self.replay.rewind();
    }
}
