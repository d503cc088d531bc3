use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;

use super::{CloseOutcome, Ledger, PnlSummary, Trade, TradeAction, TradeFilter};
use crate::errors::{Error, Result};

/// Cloneable handle to one ledger, serializing every operation behind a lock.
///
/// Each call holds the lock for its whole read-modify-write, so two closes racing on the
/// same trade can never take more than its remaining quantity.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }
}

impl SharedLedger {
    /// Creates a handle to an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.inner.lock().map_err(|_| Error::LockPoisoned)
    }

    /// See [`Ledger::open_trade`].
    pub fn open_trade(&self, action: TradeAction, price: f64, quantity: f64, time: NaiveDateTime) -> Result<Trade> {
        self.lock()?.open_trade(action, price, quantity, time)
    }

    /// See [`Ledger::close_trade`].
    pub fn close_trade(&self, index: usize, quantity: f64, close_price: f64, time: NaiveDateTime) -> Result<CloseOutcome> {
        self.lock()?.close_trade(index, quantity, close_price, time)
    }

    /// See [`Ledger::mark_to_market`].
    pub fn mark_to_market(&self, current_price: f64) -> Result<PnlSummary> {
        Ok(self.lock()?.mark_to_market(current_price))
    }

    /// See [`Ledger::summary`].
    pub fn summary(&self) -> Result<PnlSummary> {
        Ok(self.lock()?.summary())
    }

    /// See [`Ledger::list_trades`].
    pub fn list_trades(&self, filter: TradeFilter) -> Result<Vec<Trade>> {
        Ok(self.lock()?.list_trades(filter))
    }

    /// See [`Ledger::reset`].
    pub fn reset(&self) -> Result<()> {
        self.lock()?.reset();
        Ok(())
    }

    /// Runs `func` with exclusive access to the ledger.
    pub fn with<T, F>(&self, func: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        func(&mut *self.lock()?)
    }
}

#[cfg(test)]
#[test]
fn racing_closes_never_over_close() {
    use std::thread;

    let shared = SharedLedger::new();
    let time = NaiveDateTime::default();
    shared.open_trade(TradeAction::Buy, 100.0, 10.0, time).unwrap();

    let handles = (0..8)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.close_trade(0, 3.0, 101.0, time))
        })
        .collect::<Vec<_>>();

    let results = handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::OverClose { .. }))
    );

    let trades = shared.list_trades(TradeFilter::All).unwrap();
    assert_eq!(trades[0].remaining_quantity(), 1.0);
    assert_eq!(trades[0].realized_profit_loss(), 9.0);
}

#[cfg(test)]
#[test]
fn poisoned_lock() {
    let shared = SharedLedger::new();
    let clone = shared.clone();
    let _ = std::thread::spawn(move || {
        let _guard = clone.inner.lock().unwrap();
        panic!("poison");
    })
    .join();

    assert!(matches!(shared.summary(), Err(Error::LockPoisoned)));
}

#[cfg(test)]
#[test]
fn with_exclusive_access() {
    let shared = SharedLedger::from(Ledger::new());
    let time = NaiveDateTime::default();
    let count = shared
        .with(|ledger| {
            ledger.open_trade(TradeAction::Sell, 2.0, 1.0, time)?;
            ledger.open_trade(TradeAction::Buy, 2.0, 1.0, time)?;
            Ok(ledger.len())
        })
        .unwrap();
    assert_eq!(count, 2);

    shared.reset().unwrap();
    assert!(shared.list_trades(TradeFilter::All).unwrap().is_empty());
}
