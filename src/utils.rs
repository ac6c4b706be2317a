use crate::error::{DashboardError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar year-month bucket. Orders chronologically and renders as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(DashboardError::InvalidMonthKey(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        parse_month_key(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = DashboardError;

    fn try_from(value: String) -> Result<Self> {
        parse_month_key(&value)
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Parses "YYYY-MM" (or a full "YYYY-MM-DD" date, truncated to its month).
pub fn parse_month_key(input: &str) -> Result<MonthKey> {
    parse_date(input)
        .map(MonthKey::from_date)
        .map_err(|_| DashboardError::InvalidMonthKey(input.to_string()))
}

/// Parses a dataset timestamp. Month-precision values land on the first of the month.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    let month_start = format!("{}-01", trimmed);

    NaiveDate::parse_from_str(&month_start, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| {
            DashboardError::DateError(format!(
                "Invalid date '{}'. Expected YYYY-MM or YYYY-MM-DD",
                input
            ))
        })
}

/// Human label for a metric column: `Amount_total` becomes `Amount Total`.
pub fn display_label(column: &str) -> String {
    column
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compact magnitude format used in narrative text: `1.50K`, `2.35M`, `1.00B`.
pub fn format_magnitude(value: f64) -> String {
    format_with_suffix(value, 2)
}

/// Same thresholds as [`format_magnitude`] with one extra decimal, for hover details.
pub fn format_magnitude_detail(value: f64) -> String {
    format_with_suffix(value, 3)
}

fn format_with_suffix(value: f64, precision: usize) -> String {
    let magnitude = value.abs();

    if magnitude >= 1e9 {
        format!("{:.*}B", precision, value / 1e9)
    } else if magnitude >= 1e6 {
        format!("{:.*}M", precision, value / 1e6)
    } else if magnitude >= 1e3 {
        format!("{:.*}K", precision, value / 1e3)
    } else {
        format!("{:.*}", precision, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_key() {
        let key = parse_month_key("2023-05").unwrap();
        assert_eq!(key.year(), 2023);
        assert_eq!(key.month(), 5);
        assert_eq!(key.to_string(), "2023-05");

        let truncated = parse_month_key("2023-05-17").unwrap();
        assert_eq!(truncated, key);

        assert!(parse_month_key("2023-13").is_err());
        assert!(parse_month_key("May 2023").is_err());
    }

    #[test]
    fn test_month_key_ordering() {
        let jan = MonthKey::new(2023, 1).unwrap();
        let may = MonthKey::new(2023, 5).unwrap();
        let dec_prev = MonthKey::new(2022, 12).unwrap();

        let mut keys = vec![may, jan, dec_prev];
        keys.sort();
        assert_eq!(keys, vec![dec_prev, jan, may]);
        assert!(MonthKey::new(2023, 0).is_err());
    }

    #[test]
    fn test_month_key_serde() {
        let key = MonthKey::new(2024, 2).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2024-02\"");

        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<MonthKey>("\"2024-99\"").is_err());
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("Amount_total"), "Amount Total");
        assert_eq!(display_label("Income_2"), "Income 2");
        assert_eq!(display_label("var1"), "Var1");
    }

    #[test]
    fn test_format_magnitude_thresholds() {
        assert_eq!(format_magnitude(999.994), "999.99");
        assert_eq!(format_magnitude(1_000.0), "1.00K");
        assert_eq!(format_magnitude(1_500_000.0), "1.50M");
        assert_eq!(format_magnitude(2_340_000_000.0), "2.34B");
        assert_eq!(format_magnitude(-4_200.0), "-4.20K");
    }

    #[test]
    fn test_format_magnitude_detail() {
        assert_eq!(format_magnitude_detail(1_234.0), "1.234K");
        assert_eq!(format_magnitude_detail(12.0), "12.000");
    }
}
