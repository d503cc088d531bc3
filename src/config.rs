use std::path::PathBuf;

use chrono::NaiveDateTime;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::history::Timeframe;

/// Settings of a replay [`Session`](crate::session::Session).
///
/// ### Example
/// ```rust
/// use tradesim::prelude::*;
///
/// let config = SessionConfig::default()
///     .symbol("GBPUSD")
///     .timeframe(Timeframe::M15)
///     .data_dir("data");
/// assert_eq!(config.history_path().to_str(), Some("data/GBPUSD15.csv"));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Instrument whose history is replayed.
    pub symbol: String,
    /// Bar timeframe, serialized as minutes.
    pub timeframe: Timeframe,
    /// Directory holding the history files.
    pub data_dir: PathBuf,
    /// Replay only bars at or before this time.
    pub start: Option<NaiveDateTime>,
    /// Price value of one pip.
    pub pip_size: f64,
    /// Distance of the projection line on the profit side, in pips.
    pub take_profit_pips: f64,
    /// Distance of the projection line on the loss side, in pips.
    pub stop_loss_pips: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_owned(),
            timeframe: Timeframe::M1,
            data_dir: PathBuf::from("."),
            start: None,
            pip_size: 0.0001,
            take_profit_pips: 40.0,
            stop_loss_pips: 30.0,
        }
    }
}

impl SessionConfig {
    /// Sets the instrument symbol.
    pub fn symbol(mut self, symbol: impl ToString) -> Self {
        self.symbol = symbol.to_string();
        self
    }

    /// Sets the bar timeframe.
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// Sets the directory holding the history files.
    pub fn data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Limits the replay to bars at or before `start`.
    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the price value of one pip.
    pub fn pip_size(mut self, pip_size: f64) -> Self {
        self.pip_size = pip_size;
        self
    }

    /// Sets the projection distances, in pips.
    pub fn projection_pips(mut self, take_profit: f64, stop_loss: f64) -> Self {
        self.take_profit_pips = take_profit;
        self.stop_loss_pips = stop_loss;
        self
    }

    /// Returns the path of the history file for the symbol and timeframe.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(self.timeframe.file_name(&self.symbol))
    }

    /// Checks the pip settings.
    pub fn validate(&self) -> Result<()> {
        let settings = [
            ("pipSize", self.pip_size),
            ("takeProfitPips", self.take_profit_pips),
            ("stopLossPips", self.stop_loss_pips),
        ];
        for (name, value) in settings {
            if value <= 0.0 || !value.is_finite() {
                return Err(Error::InvalidPipSetting { name, value });
            }
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    /// Reads a config from a JSON file. Missing fields take their default value.
    pub fn from_json_file(filepath: impl AsRef<std::path::Path>) -> Result<Self> {
        use std::{fs::File, io::BufReader};

        let file = File::open(filepath)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[test]
fn default_config() {
    let config = SessionConfig::default();
    assert_eq!(config.symbol, "EURUSD");
    assert_eq!(config.timeframe, Timeframe::M1);
    assert_eq!(config.history_path(), PathBuf::from("./EURUSD1.csv"));
    assert!(config.validate().is_ok());
}

#[cfg(test)]
#[test]
fn invalid_pips() {
    let config = SessionConfig::default().pip_size(0.0);
    assert!(matches!(
        config.validate(),
        Err(Error::InvalidPipSetting { name: "pipSize", .. })
    ));

    let config = SessionConfig::default().projection_pips(-1.0, 30.0);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, Error::InvalidPipSetting { name: "takeProfitPips", .. }));
    assert_eq!(err.to_string(), "Pip setting `takeProfitPips` must be positive and finite (got: -1)");

    let config = SessionConfig::default().projection_pips(40.0, 0.0);
    assert!(matches!(
        config.validate(),
        Err(Error::InvalidPipSetting { name: "stopLossPips", .. })
    ));
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn config_from_json() {
    let json = r#"{ "symbol": "USDJPY", "timeframe": 60, "pipSize": 0.01 }"#;
    let config: SessionConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.symbol, "USDJPY");
    assert_eq!(config.timeframe, Timeframe::H1);
    assert_eq!(config.pip_size, 0.01);
    assert_eq!(config.take_profit_pips, 40.0);
}

#[cfg(all(test, feature = "serde"))]
#[test]
fn config_from_missing_file() {
    let result = SessionConfig::from_json_file("/definitely/not/here.json");
    assert!(matches!(result, Err(Error::IoError(_))));
}
