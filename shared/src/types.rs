//! Common types used across the ledger

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Calendar year-month a sales report aggregates, serialized as `"YYYY-MM"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, &'static str> {
        if !(1..=12).contains(&month) {
            return Err("Report period month must be between 01 and 12");
        }
        if !(1900..=9999).contains(&year) {
            return Err("Report period year must have four digits");
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportPeriod {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or("Report period must be formatted as YYYY-MM")?;
        if year.len() != 4 || month.len() != 2 {
            return Err("Report period must be formatted as YYYY-MM");
        }
        let year = year
            .parse::<i32>()
            .map_err(|_| "Report period year is not a number")?;
        let month = month
            .parse::<u32>()
            .map_err(|_| "Report period month is not a number")?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for ReportPeriod {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportPeriod> for String {
    fn from(period: ReportPeriod) -> Self {
        period.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period() {
        let period: ReportPeriod = "2024-03".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2024-03");
    }

    #[test]
    fn test_reject_malformed_period() {
        assert!("2024-13".parse::<ReportPeriod>().is_err());
        assert!("2024-3".parse::<ReportPeriod>().is_err());
        assert!("202403".parse::<ReportPeriod>().is_err());
        assert!("abcd-01".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn test_period_serde_as_string() {
        let period = ReportPeriod::new(2024, 11).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2024-11\"");

        let back: ReportPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
        assert!(serde_json::from_str::<ReportPeriod>("\"2024-00\"").is_err());
    }
}
