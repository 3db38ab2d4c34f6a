use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConnectorError;

/// One bar of price history: bar open time and close price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(ts: DateTime<Utc>, close: f64) -> Self {
        PricePoint { ts, close }
    }

    /// Build from a unix timestamp in milliseconds. `None` if out of range.
    pub fn from_millis(ms: i64, close: f64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(ms).map(|ts| PricePoint { ts, close })
    }
}

/// Bar size, spelled the way Yahoo's chart API spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "2m")]
    Minute2,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "90m")]
    Minute90,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute2 => "2m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Minute60 => "60m",
            Interval::Minute90 => "90m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
        }
    }

    /// Bar length in minutes. `60m` and `1h` are the same bar.
    pub fn minutes(&self) -> u32 {
        match self {
            Interval::Minute1 => 1,
            Interval::Minute2 => 2,
            Interval::Minute5 => 5,
            Interval::Minute15 => 15,
            Interval::Minute30 => 30,
            Interval::Minute60 | Interval::Hour1 => 60,
            Interval::Minute90 => 90,
            Interval::Day1 => 1440,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::Minute1),
            "2m" => Ok(Interval::Minute2),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "30m" => Ok(Interval::Minute30),
            "60m" => Ok(Interval::Minute60),
            "90m" => Ok(Interval::Minute90),
            "1h" => Ok(Interval::Hour1),
            "1d" => Ok(Interval::Day1),
            other => {
                Err(ConnectorError::InvalidValue { kind: "interval", value: other.to_string() })
            }
        }
    }
}

/// How far back to fetch, ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
        }
    }

    /// Calendar days covered, for sources that take a day count.
    pub fn days(&self) -> u32 {
        match self {
            Period::Day1 => 1,
            Period::Day5 => 5,
            Period::Month1 => 30,
            Period::Month3 => 90,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Period::Day1),
            "5d" => Ok(Period::Day5),
            "1mo" => Ok(Period::Month1),
            "3mo" => Ok(Period::Month3),
            other => Err(ConnectorError::InvalidValue { kind: "period", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: Interval,
    pub period: Period,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        HistoryRequest {
            symbol: "BTC-USD".to_string(),
            interval: Interval::Minute5,
            period: Period::Day1,
        }
    }
}
