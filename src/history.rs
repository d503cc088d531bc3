use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use chrono::{NaiveDateTime, Timelike};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::engine::{Candle, CandleBuilder};
use crate::errors::{Error, Result};

// 2024-01-02 09:31:00	1.09512	1.09530	1.09501	1.09527	182
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M"];

/// Bar duration of a history file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Timeframe {
    /// One minute.
    #[default]
    M1,
    /// Five minutes.
    M5,
    /// Fifteen minutes.
    M15,
    /// Thirty minutes.
    M30,
    /// One hour.
    H1,
}

impl Timeframe {
    /// Every supported timeframe, shortest first.
    pub const ALL: [Timeframe; 5] = [Self::M1, Self::M5, Self::M15, Self::M30, Self::H1];

    /// Length of one bar in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
        }
    }

    /// Like `Timeframe::try_from`, but unknown values fall back to one minute.
    pub fn from_minutes_lossy(minutes: u32) -> Self {
        Self::try_from(minutes).unwrap_or_else(|_| {
            warn!(minutes, "unsupported timeframe, falling back to 1 minute");
            Self::M1
        })
    }

    /// Name of the history file of `symbol` for this timeframe (e.g. `EURUSD15.csv`).
    pub fn file_name(&self, symbol: &str) -> String {
        format!("{symbol}{}.csv", self.minutes())
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = Error;

    fn try_from(minutes: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.minutes() == minutes)
            .ok_or(Error::InvalidTimeframe(minutes))
    }
}

impl From<Timeframe> for u32 {
    fn from(value: Timeframe) -> Self {
        value.minutes()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H1 => f.write_str("1h"),
            other => write!(f, "{}m", other.minutes()),
        }
    }
}

/// Parses a bar time, truncated to the minute.
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|time| time.with_second(0))
        .and_then(|time| time.with_nanosecond(0))
}

fn parse_row(line: usize, row: &str) -> Result<Candle> {
    let parse_error = |reason: String| Error::Parse { line, reason };

    let fields = row.split('\t').map(str::trim).collect::<Vec<_>>();
    if fields.len() < 5 {
        return Err(parse_error(format!("expected at least 5 columns, found {}", fields.len())));
    }

    let time = parse_time(fields[0]).ok_or_else(|| parse_error(format!("invalid datetime {:?}", fields[0])))?;
    let mut prices = [0.0; 4];
    for (price, field) in prices.iter_mut().zip(&fields[1..5]) {
        *price = field
            .parse::<f64>()
            .map_err(|e| parse_error(format!("invalid price {field:?}: {e}")))?;
    }
    let [open, high, low, close] = prices;

    let builder = CandleBuilder::builder()
        .time(time)
        .open(open)
        .high(high)
        .low(low)
        .close(close);
    let builder = match fields.get(5) {
        Some(field) => builder.volume(
            field
                .parse::<f64>()
                .map_err(|e| parse_error(format!("invalid volume {field:?}: {e}")))?,
        ),
        None => builder,
    };

    builder.build().map_err(|e| parse_error(e.to_string()))
}

/// Reads headerless tab-separated bars (`datetime, open, high, low, close[, volume]`).
///
/// Blank lines are skipped. Line numbers in errors start at 1.
pub fn parse_candles<R: BufRead>(reader: R) -> Result<Vec<Candle>> {
    let mut candles = Vec::new();
    for (i, row) in reader.lines().enumerate() {
        let row = row?;
        if row.trim().is_empty() {
            continue;
        }
        candles.push(parse_row(i + 1, &row)?);
    }
    Ok(candles)
}

/// Reads bars from `filepath`. See [`parse_candles`].
pub fn load_candles(filepath: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let filepath = filepath.as_ref();
    let file = File::open(filepath)?;
    let candles = parse_candles(BufReader::new(file))?;
    info!(path = %filepath.display(), bars = candles.len(), "history loaded");
    Ok(candles)
}

/// Keeps the bars at or before `start`.
pub fn until(candles: Vec<Candle>, start: NaiveDateTime) -> Vec<Candle> {
    candles.into_iter().filter(|c| c.time() <= start).collect()
}

/// Loads the history file selected by `config`, applying its start filter.
pub fn load_session_data(config: &SessionConfig) -> Result<Vec<Candle>> {
    let candles = load_candles(config.history_path())?;
    let candles = match config.start {
        Some(start) => until(candles, start),
        None => candles,
    };
    if candles.is_empty() {
        return Err(Error::CandleDataEmpty);
    }
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    const ROWS: &str = "2024-01-02 09:30:00\t1.0950\t1.0955\t1.0948\t1.0953\t120\n\
                        2024-01-02 09:31\t1.0953\t1.0960\t1.0951\t1.0958\t98\n\
                        \n\
                        2024.01.02 09:32\t1.0958\t1.0958\t1.0940\t1.0942\t143\n";

    fn time(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn timeframe_minutes() {
        assert_eq!(Timeframe::try_from(15).unwrap(), Timeframe::M15);
        assert_eq!(u32::from(Timeframe::H1), 60);
        assert!(matches!(Timeframe::try_from(240), Err(Error::InvalidTimeframe(240))));
        assert_eq!(Timeframe::from_minutes_lossy(2), Timeframe::M1);
        assert_eq!(Timeframe::M30.file_name("EURUSD"), "EURUSD30.csv");
        assert_eq!(Timeframe::H1.to_string(), "1h");
        assert_eq!(Timeframe::M5.to_string(), "5m");
    }

    #[test]
    fn parse_formats() {
        assert_eq!(parse_time("2024-01-02 09:30:45"), Some(time(9, 30)));
        assert_eq!(parse_time("2024-01-02 09:30"), Some(time(9, 30)));
        assert_eq!(parse_time("2024.01.02 09:30"), Some(time(9, 30)));
        assert_eq!(parse_time("02/01/2024"), None);
    }

    #[test]
    fn parse_rows() {
        let candles = parse_candles(ROWS.as_bytes()).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].time(), time(9, 30));
        assert_eq!(candles[1].close(), 1.0958);
        assert_eq!(candles[2].low(), 1.0940);
        assert_eq!(candles[2].volume(), 143.0);
    }

    #[test]
    fn parse_without_volume() {
        let candles = parse_candles("2024-01-02 09:30\t1.1\t1.2\t1.0\t1.15".as_bytes()).unwrap();
        assert_eq!(candles[0].volume(), 0.0);
    }

    #[test]
    fn parse_errors_report_the_line() {
        let rows = "2024-01-02 09:30\t1.1\t1.2\t1.0\t1.15\t1\nnot a date\t1\t1\t1\t1\t1\n";
        assert!(matches!(parse_candles(rows.as_bytes()), Err(Error::Parse { line: 2, .. })));

        let rows = "2024-01-02 09:30\t1.1\tabc\t1.0\t1.15\t1\n";
        assert!(matches!(parse_candles(rows.as_bytes()), Err(Error::Parse { line: 1, .. })));

        let rows = "2024-01-02 09:30\t1.1\t1.2\n";
        assert!(matches!(parse_candles(rows.as_bytes()), Err(Error::Parse { line: 1, .. })));

        // high below low
        let rows = "2024-01-02 09:30\t1.1\t1.0\t1.2\t1.15\t1\n";
        assert!(matches!(parse_candles(rows.as_bytes()), Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn filter_until_start() {
        let candles = parse_candles(ROWS.as_bytes()).unwrap();
        let candles = until(candles, time(9, 31));
        assert_eq!(candles.len(), 2);
        assert!(candles.iter().all(|c| c.time() <= time(9, 31)));
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join(format!("tradesim-history-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("EURUSD5.csv"), ROWS).unwrap();

        let config = SessionConfig::default().data_dir(&dir).timeframe(Timeframe::M5);
        assert_eq!(load_session_data(&config).unwrap().len(), 3);

        let config = config.start(time(9, 0));
        assert!(matches!(load_session_data(&config), Err(Error::CandleDataEmpty)));

        let config = SessionConfig::default().data_dir(&dir).timeframe(Timeframe::M15);
        assert!(matches!(load_session_data(&config), Err(Error::IoError(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
