//! # Bar replay with manual trades
//!
//! Steps through four hours of one-minute bars, buying on every new 30-bar low and selling on
//! every new 30-bar high, then scaling out of each trade in two halves 20 bars later.
//!
//! Pass a directory holding `EURUSD1.csv` to replay real history instead:
//! `cargo run --example replay -- ./data`
mod utils;

use std::{collections::VecDeque, error::Error};

use tradesim::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SessionConfig::default();
    let mut session = match std::env::args().nth(1) {
        Some(dir) => Session::load(config.data_dir(dir))?,
        None => Session::new(config, utils::example_candles())?,
    };

    let mut window = VecDeque::with_capacity(30);
    let mut exits = VecDeque::new();

    while !session.replay().is_finished() {
        let tick = session.step()?;
        let close = tick.current_price;
        let bar = tick.next_index;

        if window.len() == 30 {
            let low = window.iter().copied().fold(f64::INFINITY, f64::min);
            let high = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let action = if close < low {
                Some(TradeAction::Buy)
            } else if close > high {
                Some(TradeAction::Sell)
            } else {
                None
            };

            if let Some(action) = action {
                let trade = session.open_trade(action, None, 10_000.0)?;
                let Projection { upper, lower } = session.projection(action, close);
                println!("#{} {action} @ {close:.5} (guides {lower:.5} / {upper:.5})", trade.index());
                exits.push_back((bar + 20, trade.index()));
            }
            window.pop_front();
        }
        window.push_back(close);

        while let Some(&(due, index)) = exits.front() {
            if due > bar {
                break;
            }
            exits.pop_front();
            let half = session.ledger().trade(index)?.quantity() / 2.0;
            let first = session.close_trade(index, Some(half), None)?;
            let rest = session.close_trade(index, None, None)?;
            println!(
                "#{index} closed: {:.2} + {:.2} ({})",
                first.outcome.realized_pnl, rest.outcome.realized_pnl, rest.summary
            );
        }
    }

    let account = session.account();
    let open = account.trades.iter().filter(|t| t.is_open()).count();
    println!("trades {} (open {open})", account.trades.len());
    println!("{}", account.summary);

    #[cfg(feature = "serde")]
    println!("{}", serde_json::to_string_pretty(&account.summary)?);

    Ok(())
}
