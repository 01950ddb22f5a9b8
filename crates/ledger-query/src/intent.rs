//! Rule-based intent classification (§4.6 step 1): a fixed ordered keyword
//! lexicon, first match wins, ties broken by declaration order.

/// The fixed intent enumeration from §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SumByCategory,
    SumByVendor,
    SumByPeriod,
    Count,
    ListTopK,
    FindSpecific,
    Freeform,
}

/// Declaration order is the tie-break order: the first entry whose keyword
/// appears in the lowercased question wins, regardless of how many other
/// entries would also match.
const LEXICON: &[(Intent, &[&str])] = &[
    (
        Intent::SumByCategory,
        &["spend on", "spent on", "spending on", "by category", "per category"],
    ),
    (
        Intent::SumByVendor,
        &["spend at", "spent at", "spending at", "by vendor", "per vendor"],
    ),
    (
        Intent::SumByPeriod,
        &[
            "this month", "last month", "this week", "last week", "today", "yesterday",
            "by month", "per month",
        ],
    ),
    (Intent::Count, &["how many", "number of", "count of"]),
    (
        Intent::ListTopK,
        &["top ", "largest", "biggest", "most expensive", "highest"],
    ),
    (
        Intent::FindSpecific,
        &["find ", "receipt number", "receipt from", "show me the receipt"],
    ),
];

/// Classify `question` by scanning the lexicon in declaration order and
/// returning the first intent whose keyword list contains a substring match.
/// Falls back to `Freeform` if nothing matches.
pub fn classify(question: &str) -> Intent {
    let lower = question.to_lowercase();
    for (intent, keywords) in LEXICON {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *intent;
        }
    }
    Intent::Freeform
}
