use std::sync::Arc;

use super::Candle;
use crate::errors::{Error, Result};

/// Steps through historical bars one at a time.
#[derive(Debug, Clone)]
pub struct Replay {
    data: Arc<[Candle]>,
    // Index of the next bar to step
    cursor: usize,
}

impl Replay {
    /// Creates a replay positioned before the first bar.
    pub fn new(data: Arc<[Candle]>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::CandleDataEmpty);
        }
        Ok(Self { data, cursor: 0 })
    }

    /// Returns an iterator over all the bars.
    pub fn candles(&self) -> std::slice::Iter<'_, Candle> {
        self.data.iter()
    }

    /// Number of bars in the history.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: a replay holds at least one bar.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index of the bar the next [`step`](Self::step) returns.
    pub fn next_index(&self) -> usize {
        self.cursor
    }

    /// Number of bars left to step.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    /// Returns `true` once every bar was stepped.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// Returns the last stepped bar.
    pub fn current(&self) -> Option<&Candle> {
        self.cursor.checked_sub(1).and_then(|i| self.data.get(i))
    }

    /// Close of the last stepped bar.
    pub fn current_price(&self) -> Option<f64> {
        self.current().map(Candle::close)
    }

    /// Returns the next bar and advances the cursor.
    pub fn step(&mut self) -> Result<&Candle> {
        let index = self.cursor;
        let candle = self.data.get(index).ok_or(Error::NoMoreData(index))?;
        self.cursor += 1;
        Ok(candle)
    }

    /// Moves the cursor so that the next step returns bar `index`.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.data.len() {
            return Err(Error::NoMoreData(index));
        }
        self.cursor = index;
        Ok(())
    }

    /// Moves the cursor back before the first bar.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
fn sample() -> Arc<[Candle]> {
    use super::CandleBuilder;
    use chrono::{Duration, NaiveDate};

    let start = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    (0..3)
        .map(|i| {
            let price = 1.1 + i as f64 * 0.001;
            CandleBuilder::builder()
                .time(start + Duration::minutes(i))
                .open(price)
                .high(price)
                .low(price)
                .close(price)
                .build()
                .unwrap()
        })
        .collect()
}

#[cfg(test)]
#[test]
fn empty_replay() {
    let result = Replay::new(Arc::from_iter(Vec::<Candle>::new()));
    assert!(matches!(result, Err(Error::CandleDataEmpty)));
}

#[cfg(test)]
#[test]
fn step_until_end() {
    let mut replay = Replay::new(sample()).unwrap();
    assert!(replay.current().is_none());
    assert_eq!(replay.remaining(), 3);

    assert_eq!(replay.step().unwrap().close(), 1.1);
    assert_eq!(replay.current_price(), Some(1.1));
    replay.step().unwrap();
    replay.step().unwrap();
    assert!(replay.is_finished());
    assert!(matches!(replay.step(), Err(Error::NoMoreData(3))));
    // the last bar stays current
    assert_eq!(replay.next_index(), 3);
    assert!(replay.current().is_some());
}

#[cfg(test)]
#[test]
fn seek_and_rewind() {
    let mut replay = Replay::new(sample()).unwrap();
    replay.seek(2).unwrap();
    assert_eq!(replay.remaining(), 1);
    assert!(matches!(replay.seek(3), Err(Error::NoMoreData(3))));
    assert_eq!(replay.next_index(), 2);

    replay.rewind();
    assert_eq!(replay.next_index(), 0);
    assert!(replay.current_price().is_none());
}
