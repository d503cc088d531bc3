use chrono::{Duration, NaiveDate};
use tradesim::engine::{Candle, CandleBuilder};

/// Generates deterministic one-minute bars around `base_price`.
pub fn generate_sample_candles(max: i64, seed: i64, base_price: f64) -> Vec<Candle> {
    let mut time = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid start date");
    let mut open = base_price;

    (0..=max)
        .map(|i| {
            // Slow drift with a seeded oscillation, in the range of a few pips
            let drift = 0.00002 * (i as f64);
            let variation = 0.0015 * ((i as f64 * 0.3 + seed as f64).sin() * 0.5 + 0.5);

            let close = base_price + drift + variation;
            let high = close.max(open) + 0.0002;
            let low = close.min(open) - 0.0002;

            let candle = CandleBuilder::builder()
                .time(time)
                .open(open)
                .high(high)
                .low(low)
                .close(close)
                .volume(100.0 + 50.0 * (i as f64 * 0.2).sin().abs())
                .build()
                .expect("generated prices are consistent");

            time += Duration::minutes(1);
            open = close;
            candle
        })
        .collect()
}

pub fn example_candles() -> Vec<Candle> {
    generate_sample_candles(240, 42, 1.0950)
}
