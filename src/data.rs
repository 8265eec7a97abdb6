use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// A non-null table cell. Nulls are represented as `None` around this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Value {
    String(String),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format(CANONICAL_DATE_FORMAT).to_string(),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::String(_) => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Date(_) => 1,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            // Mixed columns only arise from hand-built tables; order by variant.
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

/// Null-aware ordering wrapper: nulls sort before every value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparableValue<'a>(pub Option<&'a Value>);

impl Ord for ComparableValue<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for ComparableValue<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Converts a raw CSV field into a cell; empty fields are null.
pub fn parse_cell(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        None
    } else {
        Some(Value::String(raw.to_string()))
    }
}

/// Parses `value` with a chrono format string.
///
/// When the format ends in a four digit year (`%Y`), the trailing year
/// token must be exactly four digits; `1/5/24` is rejected rather than read
/// as the year 24.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if format.ends_with("%Y") {
        let year_digits = trimmed
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if year_digits != 4 {
            return None;
        }
    }
    NaiveDate::parse_from_str(trimmed, format).ok()
}

pub fn render_cell(cell: Option<&Value>) -> String {
    cell.map(Value::as_display).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_unpadded_month_and_day() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_date("5/6/2024", DEFAULT_DATE_FORMAT), Some(expected));
        assert_eq!(parse_date("05/06/2024", DEFAULT_DATE_FORMAT), Some(expected));
    }

    #[test]
    fn parse_date_rejects_non_conforming_values() {
        assert_eq!(parse_date("2024-05-06", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_date("13/01/2024", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_date("5/6/24", DEFAULT_DATE_FORMAT), None);
        assert_eq!(parse_date("", DEFAULT_DATE_FORMAT), None);
    }

    #[test]
    fn parse_cell_treats_empty_as_null() {
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("x"), Some(Value::from("x")));
    }

    #[test]
    fn comparable_value_orders_none_before_some() {
        let value = Value::from("0");
        let none = ComparableValue(None);
        let some = ComparableValue(Some(&value));
        assert!(none < some);
    }

    #[test]
    fn date_values_display_canonically() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(date.as_display(), "2024-01-09");
        assert_eq!(render_cell(None), "");
    }
}
