//! # ledger-ingest
//!
//! The Ingestor (§4.5): validates, audits, and writes a receipt through to
//! both the Relational Store and the Vector Index, with a reconciliation
//! queue absorbing the case where only the store half succeeds.

pub mod ingestor;
pub mod reconciliation;

pub use ingestor::Ingestor;
pub use reconciliation::{spawn_ticker, ReconcileAction, ReconcileEntry, ReconciliationQueue};
