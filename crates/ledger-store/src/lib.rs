//! # ledger-store
//!
//! The Relational Store (§4.1): durable typed storage of receipts and line
//! items, filtered listing, and the three aggregations.

pub mod error;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use store::{AmountTotal, ReceiptFilter, RelationalStore};
