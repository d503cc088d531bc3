use super::*;
use super::TradeAction::*;

use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap()
}

fn minute(n: i64) -> NaiveDateTime {
    start() + Duration::minutes(n)
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

fn assert_invariants(ledger: &Ledger) {
    for trade in ledger.trades() {
        assert!(trade.remaining_quantity() >= 0.0);
        assert!(trade.remaining_quantity() <= trade.quantity());
        assert_eq!(trade.is_open(), trade.remaining_quantity() > 0.0);
        assert_eq!(trade.is_open(), trade.close_price().is_none());
        assert_eq!(trade.is_open(), trade.close_time().is_none());
    }
}

#[test]
fn scenario_a_mark_open_buy() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();

    let summary = ledger.mark_to_market(1.2050);
    let trade = ledger.trade(0).unwrap();
    assert_close(trade.profit_loss(), 0.05);
    assert_close(summary.unrealized, 0.05);
    assert_close(summary.realized, 0.0);
    assert_close(summary.total, 0.05);
}

#[test]
fn scenario_b_partial_close() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.mark_to_market(1.2050);

    let outcome = ledger.close_trade(0, 4.0, 1.2100, minute(1)).unwrap();
    assert_close(outcome.realized_pnl, 0.04);
    assert_close(outcome.trade.realized_profit_loss(), 0.04);
    assert_eq!(outcome.trade.remaining_quantity(), 6.0);
    assert!(outcome.trade.is_open());
    assert_eq!(outcome.trade.status(), TradeStatus::PartiallyClosed);
    assert!(outcome.trade.close_price().is_none());
}

#[test]
fn scenario_c_full_close() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.close_trade(0, 4.0, 1.2100, minute(1)).unwrap();

    let outcome = ledger.close_trade(0, 6.0, 1.1950, minute(2)).unwrap();
    assert_close(outcome.realized_pnl, -0.03);
    assert_close(outcome.trade.realized_profit_loss(), 0.01);
    assert_eq!(outcome.trade.remaining_quantity(), 0.0);
    assert!(!outcome.trade.is_open());
    assert_eq!(outcome.trade.close_price(), Some(1.1950));
    assert_eq!(outcome.trade.close_time(), Some(minute(2)));

    let summary = ledger.mark_to_market(1.3000);
    assert_close(summary.unrealized, 0.0);
    assert_close(summary.realized, 0.01);
    assert_close(summary.total, 0.01);
}

#[test]
fn scenario_d_over_close_is_rejected() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.close_trade(0, 4.0, 1.2100, minute(1)).unwrap();
    let before = ledger.trade(0).unwrap().clone();

    let result = ledger.close_trade(0, 7.0, 1.2100, minute(2));
    assert!(matches!(
        result,
        Err(Error::OverClose { requested, remaining }) if requested == 7.0 && remaining == 6.0
    ));
    assert_eq!(result.unwrap_err().kind(), crate::errors::ErrorKind::Validation);
    assert_eq!(ledger.trade(0).unwrap(), &before);
}

#[test]
fn scenario_e_unknown_trade() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Sell, 1.2000, 1.0, minute(0)).unwrap();

    let result = ledger.close_trade(5, 1.0, 1.2000, minute(1));
    assert!(matches!(result, Err(Error::TradeNotFound(5))));
    assert!(matches!(ledger.trade(5), Err(Error::TradeNotFound(5))));
}

#[test]
fn close_already_closed_trade() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Sell, 1.2000, 1.0, minute(0)).unwrap();
    ledger.close_trade_fully(0, 1.1900, minute(1)).unwrap();

    let result = ledger.close_trade(0, 1.0, 1.1800, minute(2));
    assert!(matches!(result, Err(Error::TradeClosed(0))));
    assert_eq!(result.unwrap_err().kind(), crate::errors::ErrorKind::NotFound);
    assert!(matches!(
        ledger.close_trade_fully(0, 1.1800, minute(2)),
        Err(Error::TradeClosed(0))
    ));
    // close fields were stamped once, by the first full close
    assert_eq!(ledger.trade(0).unwrap().close_price(), Some(1.1900));
    assert_eq!(ledger.trade(0).unwrap().close_time(), Some(minute(1)));
}

#[test]
fn sell_side_mirror() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Sell, 1.2000, 10.0, minute(0)).unwrap();

    let summary = ledger.mark_to_market(1.1950);
    assert_close(summary.unrealized, 0.05);

    let outcome = ledger.close_trade(0, 5.0, 1.2100, minute(1)).unwrap();
    assert_close(outcome.realized_pnl, -0.05);
    // remaining half re-marked at the close price
    assert_close(outcome.trade.profit_loss(), -0.05);

    let summary = ledger.mark_to_market(1.1900);
    assert_close(summary.unrealized, 0.05);
    assert_close(summary.realized, -0.05);
    assert_close(summary.total, 0.0);
}

#[test]
fn partial_close_marks_the_whole_ledger() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.mark_to_market(1.2050);

    ledger.close_trade(0, 4.0, 1.2100, minute(1)).unwrap();
    assert_eq!(ledger.mark_price(), Some(1.2100));
    assert_close(ledger.trade(0).unwrap().profit_loss(), 0.06);
    assert_close(ledger.trade(1).unwrap().profit_loss(), 0.1);

    let summary = ledger.summary();
    assert_close(summary.unrealized, 0.16);
    assert_close(summary.realized, 0.04);
    assert_close(summary.total, 0.2);

    // the next trade is valued at the same price as the others
    let trade = ledger.open_trade(Sell, 1.2050, 2.0, minute(2)).unwrap();
    assert_close(trade.profit_loss(), -0.01);
}

#[test]
fn failed_close_keeps_the_mark() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 1.0, minute(0)).unwrap();
    ledger.mark_to_market(1.2050);

    assert!(ledger.close_trade(0, 2.0, 1.3000, minute(1)).is_err());
    assert_eq!(ledger.mark_price(), Some(1.2050));
    assert_close(ledger.summary().unrealized, 0.005);
}

#[test]
fn open_trade_validation() {
    let mut ledger = Ledger::new();
    assert!(matches!(
        ledger.open_trade(Buy, 0.0, 1.0, minute(0)),
        Err(Error::NegZeroPrice(_))
    ));
    assert!(matches!(
        ledger.open_trade(Buy, f64::INFINITY, 1.0, minute(0)),
        Err(Error::NegZeroPrice(_))
    ));
    assert!(matches!(
        ledger.open_trade(Sell, 1.0, -2.0, minute(0)),
        Err(Error::NegZeroQuantity(_))
    ));
    assert!(matches!(
        ledger.open_trade_str("hold", 1.0, 1.0, minute(0)),
        Err(Error::InvalidAction(_))
    ));
    assert!(ledger.is_empty());

    let trade = ledger.open_trade_str("Sell", 1.0, 1.0, minute(0)).unwrap();
    assert_eq!(trade.action(), Sell);
}

#[test]
fn indexes_are_sequential() {
    let mut ledger = Ledger::new();
    for i in 0..5 {
        let trade = ledger.open_trade(Buy, 1.0 + i as f64, 1.0, minute(i)).unwrap();
        assert_eq!(trade.index(), i as usize);
    }
    ledger.close_trade_fully(2, 2.0, minute(6)).unwrap();
    let trade = ledger.open_trade(Sell, 1.0, 1.0, minute(7)).unwrap();
    assert_eq!(trade.index(), 5);
}

#[test]
fn new_trade_is_marked_against_last_price() {
    let mut ledger = Ledger::new();
    let trade = ledger.open_trade(Buy, 100.0, 1.0, minute(0)).unwrap();
    assert_eq!(trade.profit_loss(), 0.0);

    ledger.mark_to_market(102.0);
    let trade = ledger.open_trade(Buy, 101.0, 2.0, minute(1)).unwrap();
    assert_eq!(trade.profit_loss(), 2.0);
    assert_eq!(ledger.summary().unrealized, 4.0);
}

#[test]
fn mark_to_market_is_idempotent() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.2000, 10.0, minute(0)).unwrap();
    ledger.open_trade(Sell, 1.2020, 3.0, minute(1)).unwrap();
    ledger.close_trade(0, 2.0, 1.2030, minute(2)).unwrap();

    let first = ledger.mark_to_market(1.2040);
    let trades = ledger.list_trades(TradeFilter::All);
    let second = ledger.mark_to_market(1.2040);
    assert_eq!(first, second);
    assert_eq!(trades, ledger.list_trades(TradeFilter::All));
}

#[test]
fn mark_to_market_keeps_realized() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 10.0, 2.0, minute(0)).unwrap();
    ledger.close_trade(0, 1.0, 12.0, minute(1)).unwrap();

    for price in [8.0, 15.0, 11.0] {
        let summary = ledger.mark_to_market(price);
        assert_eq!(summary.realized, 2.0);
        assert_eq!(summary.unrealized, price - 10.0);
        assert_eq!(ledger.mark_price(), Some(price));
    }
}

#[test]
fn partial_closes_are_priced_independently() {
    let mut split = Ledger::new();
    split.open_trade(Buy, 100.0, 4.0, minute(0)).unwrap();
    split.close_trade(0, 2.0, 110.0, minute(1)).unwrap();
    split.close_trade(0, 2.0, 90.0, minute(2)).unwrap();

    let mut whole = Ledger::new();
    whole.open_trade(Buy, 100.0, 4.0, minute(0)).unwrap();
    whole.close_trade(0, 4.0, 100.0, minute(1)).unwrap();
    // same average price, same realized result
    assert_eq!(split.summary().realized, whole.summary().realized);

    let mut equal = Ledger::new();
    equal.open_trade(Buy, 100.0, 4.0, minute(0)).unwrap();
    equal.close_trade(0, 1.0, 105.0, minute(1)).unwrap();
    equal.close_trade(0, 3.0, 105.0, minute(2)).unwrap();
    let mut single = Ledger::new();
    single.open_trade(Buy, 100.0, 4.0, minute(0)).unwrap();
    single.close_trade(0, 4.0, 105.0, minute(1)).unwrap();
    assert_eq!(equal.summary().realized, single.summary().realized);

    // uneven slices at different prices do not blend
    let mut uneven = Ledger::new();
    uneven.open_trade(Buy, 100.0, 4.0, minute(0)).unwrap();
    uneven.close_trade(0, 1.0, 110.0, minute(1)).unwrap();
    uneven.close_trade(0, 3.0, 90.0, minute(2)).unwrap();
    assert_eq!(uneven.summary().realized, 10.0 - 30.0);
}

#[test]
fn list_trades_with_filter() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.0, 1.0, minute(0)).unwrap();
    ledger.open_trade(Sell, 1.0, 1.0, minute(1)).unwrap();
    ledger.open_trade(Buy, 1.0, 2.0, minute(2)).unwrap();
    ledger.close_trade_fully(1, 1.0, minute(3)).unwrap();
    ledger.close_trade(2, 1.0, 1.0, minute(3)).unwrap();

    let index = |trades: Vec<Trade>| trades.iter().map(Trade::index).collect::<Vec<_>>();
    assert_eq!(index(ledger.list_trades(TradeFilter::All)), vec![0, 1, 2]);
    assert_eq!(index(ledger.list_trades(TradeFilter::Open)), vec![0, 2]);
    assert_eq!(index(ledger.list_trades(TradeFilter::Closed)), vec![1]);
}

#[test]
fn reset_ends_the_session() {
    let mut ledger = Ledger::new();
    ledger.open_trade(Buy, 1.0, 1.0, minute(0)).unwrap();
    ledger.mark_to_market(2.0);

    ledger.reset();
    assert!(ledger.is_empty());
    assert!(ledger.mark_price().is_none());
    assert_eq!(ledger.summary(), PnlSummary::default());
    assert_eq!(ledger.open_trade(Sell, 1.0, 1.0, minute(1)).unwrap().index(), 0);
}

#[test]
fn random_actions_keep_invariants() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ledger = Ledger::new();
    let mut price: f64 = 1.2;
    let mut realized = 0.0;

    for step in 0..2_000 {
        price = (price + rng.random_range(-0.002..0.002)).max(0.5);
        match rng.random_range(0..4) {
            0 => {
                let action = if rng.random_bool(0.5) { Buy } else { Sell };
                let quantity = rng.random_range(0.01..5.0);
                ledger.open_trade(action, price, quantity, minute(step)).unwrap();
            }
            1 | 2 if !ledger.is_empty() => {
                let index = rng.random_range(0..ledger.len());
                let remaining = ledger.trade(index).unwrap().remaining_quantity();
                let quantity = rng.random_range(0.0..=remaining * 1.2);
                let before = ledger.trade(index).unwrap().clone();
                match ledger.close_trade(index, quantity, price, minute(step)) {
                    Ok(outcome) => realized += outcome.realized_pnl,
                    Err(_) => assert_eq!(ledger.trade(index).unwrap(), &before),
                }
            }
            _ => {
                let summary = ledger.mark_to_market(price);
                assert_close(summary.total, summary.unrealized + summary.realized);
            }
        }
        assert_invariants(&ledger);
    }

    assert!((ledger.summary().realized - realized).abs() < 1e-6);
}
