//! Locale-tolerant coercion from loosely-typed JSON values into the strict
//! types `ledger_core::Receipt` requires (§4.4 step (d)).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Coerce a JSON number or string into a `Decimal`, tolerating both `.` and
/// `,` as the decimal separator.
pub fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_locale_decimal(s),
        _ => None,
    }
}

/// `"1.234,56"` (thousands `.`, decimal `,`), `"1,234.56"` (thousands `,`,
/// decimal `.`) and plain `"45.67"` all parse to the same amount.
pub fn parse_locale_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().replace(['€', '$', ' '], "");
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') && trimmed.contains('.') {
        if trimmed.rfind(',') > trimmed.rfind('.') {
            trimmed.replace('.', "").replace(',', ".")
        } else {
            trimmed.replace(',', "")
        }
    } else if trimmed.contains(',') {
        trimmed.replace(',', ".")
    } else {
        trimmed
    };

    Decimal::from_str(&normalized).ok()
}

/// Coerce a JSON value naming a date/timestamp. Tries ISO-8601 first, then
/// falls back to `dd.mm.yyyy`.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    parse_timestamp(s)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn plain_dot_decimal_parses() {
        assert_eq!(parse_locale_decimal("45.67"), Some(dec!(45.67)));
    }

    #[test]
    fn comma_as_decimal_separator_parses() {
        assert_eq!(parse_locale_decimal("45,67"), Some(dec!(45.67)));
    }

    #[test]
    fn dot_thousands_comma_decimal_parses() {
        assert_eq!(parse_locale_decimal("1.234,56"), Some(dec!(1234.56)));
    }

    #[test]
    fn comma_thousands_dot_decimal_parses() {
        assert_eq!(parse_locale_decimal("1,234.56"), Some(dec!(1234.56)));
    }

    #[test]
    fn currency_symbol_and_spaces_are_stripped() {
        assert_eq!(parse_locale_decimal("€ 45.67"), Some(dec!(45.67)));
    }

    #[test]
    fn iso_date_parses() {
        assert!(parse_timestamp("2024-03-15").is_some());
    }

    #[test]
    fn dd_mm_yyyy_fallback_parses() {
        assert!(parse_timestamp("15.03.2024").is_some());
    }

    #[test]
    fn garbage_date_yields_none() {
        assert!(parse_timestamp("not a date").is_none());
    }
}
