//! Pulling a structured filter (category, vendor, date range) out of a
//! question, by matching against vocabulary already present in the store
//! plus the Audit Engine's watchlist (§4.6 step 2 "any structured filter the
//! classifier extracted").

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use ledger_audit::{is_watchlist_term, WATCHLIST_CATEGORIES, WATCHLIST_TERMS};

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Find the first watchlist term or category that appears as a substring of
/// `question`, if any — this is what makes "spend on alcohol" resolve to the
/// line-item-level watchlist grouping rather than a literal `category` value.
pub fn extract_watchlist_category(question: &str) -> Option<&'static str> {
    let lower = question.to_lowercase();
    WATCHLIST_CATEGORIES
        .iter()
        .chain(WATCHLIST_TERMS.iter())
        .find(|term| lower.contains(*term))
        .copied()
}

/// Find a category from `known_categories` (the distinct category values
/// already present in the store) that appears as a substring of `question`.
pub fn extract_known_category<'a>(question: &str, known_categories: &'a [String]) -> Option<&'a str> {
    let lower = question.to_lowercase();
    known_categories
        .iter()
        .find(|c| !c.is_empty() && lower.contains(&c.to_lowercase()))
        .map(|s| s.as_str())
}

/// Resolve a category filter for `sum_by_category`/`count`: prefer an exact
/// known-category match, then fall back to the watchlist grouping.
pub fn extract_category<'a>(
    question: &str,
    known_categories: &'a [String],
) -> Option<CategoryFilter<'a>> {
    if let Some(known) = extract_known_category(question, known_categories) {
        return Some(CategoryFilter::Exact(known));
    }
    extract_watchlist_category(question).map(CategoryFilter::Watchlist)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter<'a> {
    /// Matches `receipt.category` case-insensitively.
    Exact(&'a str),
    /// Matches any line item whose description contains this watchlist term,
    /// or a receipt whose own category is one of the watchlist categories.
    Watchlist(&'static str),
}

impl CategoryFilter<'_> {
    pub fn is_watchlist(&self) -> bool {
        match self {
            CategoryFilter::Watchlist(_) => true,
            CategoryFilter::Exact(category) => is_watchlist_term(*category),
        }
    }
}

/// Find a vendor from `known_vendors` (distinct vendor values already in the
/// store) that appears as a substring of `question`.
pub fn extract_vendor<'a>(question: &str, known_vendors: &'a [String]) -> Option<&'a str> {
    let lower = question.to_lowercase();
    known_vendors
        .iter()
        .find(|v| !v.is_empty() && lower.contains(&v.to_lowercase()))
        .map(|s| s.as_str())
}

/// Resolve one of a fixed set of relative-period keywords into a concrete
/// date range, anchored at `now`.
pub fn extract_period(question: &str, now: DateTime<Utc>) -> Option<DateRange> {
    let lower = question.to_lowercase();
    if lower.contains("today") {
        return Some(day_range(now));
    }
    if lower.contains("yesterday") {
        return Some(day_range(now - Duration::days(1)));
    }
    if lower.contains("this week") {
        return Some(week_range(now, 0));
    }
    if lower.contains("last week") {
        return Some(week_range(now, 1));
    }
    if lower.contains("this month") || lower.contains("by month") || lower.contains("per month") {
        return Some(month_range(now, 0));
    }
    if lower.contains("last month") {
        return Some(month_range(now, 1));
    }
    None
}

fn day_range(anchor: DateTime<Utc>) -> DateRange {
    let start = anchor
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    DateRange {
        start,
        end: start + Duration::days(1) - Duration::milliseconds(1),
    }
}

fn week_range(anchor: DateTime<Utc>, weeks_ago: i64) -> DateRange {
    let days_since_monday = anchor.weekday().num_days_from_monday() as i64;
    let this_monday = anchor.date_naive() - Duration::days(days_since_monday);
    let start = (this_monday - Duration::weeks(weeks_ago))
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    DateRange {
        start,
        end: start + Duration::weeks(1) - Duration::milliseconds(1),
    }
}

fn month_range(anchor: DateTime<Utc>, months_ago: u32) -> DateRange {
    let mut year = anchor.year();
    let mut month = anchor.month();
    for _ in 0..months_ago {
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("valid first-of-month");
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next_start = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .expect("valid first-of-next-month");
    DateRange {
        start,
        end: next_start - Duration::milliseconds(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchlist_category_found_in_question() {
        assert_eq!(
            extract_watchlist_category("how much did I spend on alcohol?"),
            Some("alcohol")
        );
    }

    #[test]
    fn known_category_takes_precedence_over_watchlist() {
        let known = vec!["Alcohol".to_string(), "Groceries".to_string()];
        let filter = extract_category("spending on groceries", &known).unwrap();
        assert_eq!(filter, CategoryFilter::Exact("Groceries"));
    }

    #[test]
    fn vendor_substring_match_is_case_insensitive() {
        let known = vec!["REWE".to_string(), "Lidl".to_string()];
        assert_eq!(extract_vendor("how much at rewe this month", &known), Some("REWE"));
    }

    #[test]
    fn this_month_resolves_to_a_month_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let range = extract_period("what did I spend this month", now).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end.date_naive().month(), 3);
    }

    #[test]
    fn last_month_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let range = extract_period("what did I spend last month", now).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
    }
}
