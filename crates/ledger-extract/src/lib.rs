//! # ledger-extract
//!
//! The Extractor (§4.4): image bytes in, a candidate `Receipt` and a
//! confidence classification out. Wraps the vision completion call with a
//! bounded JSON repair pass and a locale-tolerant type coercion pass, since
//! the completion model's output is treated as untrusted text, never as a
//! guaranteed-valid payload.

pub mod coercion;
pub mod extractor;
pub mod repair;

pub use extractor::{Confidence, ExtractionOutcome, Extractor};
