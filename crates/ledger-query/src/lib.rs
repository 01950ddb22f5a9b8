//! # ledger-query
//!
//! The Query Planner (§4.6): rule-based intent classification, vector-search
//! candidate retrieval, deterministic aggregation over the Relational Store,
//! and hybrid prose via the text completion service.

pub mod extraction;
pub mod intent;
pub mod planner;

pub use extraction::{extract_category, extract_period, extract_vendor, CategoryFilter, DateRange};
pub use intent::{classify, Intent};
pub use planner::{Answer, QueryPlanner};
