use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Bar interval. Ordered by duration, so `BTreeMap` keys iterate from the
/// most granular to the coarsest frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Min1,
    Min2,
    Min3,
    Min5,
    Min10,
    Min15,
    Min30,
    Hour1,
    Day1,
}

impl Interval {
    /// Duration of one interval in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Min1 => 60,
            Interval::Min2 => 120,
            Interval::Min3 => 180,
            Interval::Min5 => 300,
            Interval::Min10 => 600,
            Interval::Min15 => 900,
            Interval::Min30 => 1800,
            Interval::Hour1 => 3600,
            Interval::Day1 => 86_400,
        }
    }

    /// True for intervals finer than one trading day. Sub-daily intervals
    /// align on epoch-second boundaries; daily alignment follows the
    /// calendar implied by the data.
    pub fn is_intraday(&self) -> bool {
        !matches!(self, Interval::Day1)
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::Min1),
            "2m" => Ok(Interval::Min2),
            "3m" => Ok(Interval::Min3),
            "5m" => Ok(Interval::Min5),
            "10m" => Ok(Interval::Min10),
            "15m" => Ok(Interval::Min15),
            "30m" => Ok(Interval::Min30),
            "60m" | "1h" => Ok(Interval::Hour1),
            "1d" => Ok(Interval::Day1),
            other => Err(EngineError::Config(format!(
                "unsupported interval: {other}"
            ))),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::Min1 => "1m",
            Interval::Min2 => "2m",
            Interval::Min3 => "3m",
            Interval::Min5 => "5m",
            Interval::Min10 => "10m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<String> for Interval {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Interval> for String {
    fn from(i: Interval) -> Self {
        i.to_string()
    }
}
