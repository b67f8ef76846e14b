use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval a parameter set is optimized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMin,
    #[serde(rename = "5m")]
    FiveMin,
    #[serde(rename = "15m")]
    FifteenMin,
    #[serde(rename = "30m")]
    ThirtyMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// Ascending by length.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::OneMin,
        Timeframe::FiveMin,
        Timeframe::FifteenMin,
        Timeframe::ThirtyMin,
        Timeframe::OneHour,
        Timeframe::FourHour,
        Timeframe::OneDay,
    ];

    /// Bar length in seconds.
    pub fn to_seconds(&self) -> i64 {
        const MINUTE: i64 = 60;
        match self {
            Timeframe::OneMin => MINUTE,
            Timeframe::FiveMin => 5 * MINUTE,
            Timeframe::FifteenMin => 15 * MINUTE,
            Timeframe::ThirtyMin => 30 * MINUTE,
            Timeframe::OneHour => 60 * MINUTE,
            Timeframe::FourHour => 240 * MINUTE,
            Timeframe::OneDay => 1440 * MINUTE,
        }
    }

    /// Binance kline interval, also used as the canonical short form (`15m`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::OneMin),
            "5m" | "5min" => Ok(Timeframe::FiveMin),
            "15m" | "15min" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "1h" | "1hour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" => Ok(Timeframe::FourHour),
            "1d" | "1day" => Ok(Timeframe::OneDay),
            other => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1m, 5m, 15m, 30m, 1h, 4h, 1d",
                other
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_lengths() {
        assert_eq!(Timeframe::OneMin.to_seconds(), 60);
        assert_eq!(Timeframe::FifteenMin.to_seconds(), 900);
        assert_eq!(Timeframe::OneDay.to_seconds(), 86_400);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("15m").unwrap(), Timeframe::FifteenMin);
        assert_eq!(Timeframe::from_str(" 1H ").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("4hour").unwrap(), Timeframe::FourHour);
        assert!(Timeframe::from_str("2w").is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::from_str(&tf.to_string()).unwrap(), tf);
        }
    }
}
