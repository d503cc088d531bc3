use chrono::NaiveDateTime;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One historical price bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    time: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Candle {
    /// Bar open time.
    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    /// Opening price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Highest price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Lowest price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Closing price, used as the market price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Builder for [`Candle`], checking the prices on [`build`](CandleBuilder::build).
#[derive(Debug, Default)]
pub struct CandleBuilder {
    time: Option<NaiveDateTime>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl CandleBuilder {
    /// Starts an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the open time.
    pub fn time(mut self, time: NaiveDateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the opening price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the highest price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the lowest price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the closing price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Volume defaults to zero when not set.
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Builds the candle.
    ///
    /// Prices must be positive and finite with `low <= open, close <= high`.
    pub fn build(self) -> Result<Candle> {
        let missing = |field: &str| Error::InvalidCandle(format!("missing `{field}`"));
        let time = self.time.ok_or_else(|| missing("time"))?;
        let open = self.open.ok_or_else(|| missing("open"))?;
        let high = self.high.ok_or_else(|| missing("high"))?;
        let low = self.low.ok_or_else(|| missing("low"))?;
        let close = self.close.ok_or_else(|| missing("close"))?;
        let volume = self.volume.unwrap_or_default();

        for price in [open, high, low, close] {
            if price <= 0.0 || !price.is_finite() {
                return Err(Error::NegZeroPrice(price));
            }
        }
        if low > open.min(close) || high < open.max(close) {
            return Err(Error::InvalidCandle(format!(
                "prices out of range (open {open}, high {high}, low {low}, close {close})"
            )));
        }
        if volume < 0.0 || !volume.is_finite() {
            return Err(Error::InvalidCandle(format!("volume must be positive (got {volume})")));
        }

        Ok(Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

#[cfg(test)]
fn noon() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

#[cfg(test)]
#[test]
fn build_candle() {
    let candle = CandleBuilder::builder()
        .time(noon())
        .open(1.1000)
        .high(1.1010)
        .low(1.0990)
        .close(1.1005)
        .volume(42.0)
        .build()
        .unwrap();

    assert_eq!(candle.time(), noon());
    assert_eq!(candle.close(), 1.1005);
    assert_eq!(candle.volume(), 42.0);
}

#[cfg(test)]
#[test]
fn build_candle_without_volume() {
    let candle = CandleBuilder::builder()
        .time(noon())
        .open(1.0)
        .high(1.0)
        .low(1.0)
        .close(1.0)
        .build()
        .unwrap();
    assert_eq!(candle.volume(), 0.0);
}

#[cfg(test)]
#[test]
fn build_candle_missing_field() {
    let result = CandleBuilder::builder().time(noon()).open(1.0).high(1.0).low(1.0).build();
    assert!(matches!(result, Err(Error::InvalidCandle(_))));
}

#[cfg(test)]
#[test]
fn build_candle_inconsistent_prices() {
    let result = CandleBuilder::builder()
        .time(noon())
        .open(1.2)
        .high(1.1)
        .low(1.0)
        .close(1.05)
        .build();
    assert!(matches!(result, Err(Error::InvalidCandle(_))));

    let result = CandleBuilder::builder()
        .time(noon())
        .open(0.0)
        .high(1.1)
        .low(0.0)
        .close(1.05)
        .build();
    assert!(matches!(result, Err(Error::NegZeroPrice(_))));
}
