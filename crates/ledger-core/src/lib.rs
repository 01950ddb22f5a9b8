//! # ledger-core
//!
//! Domain model, validation, error taxonomy, and configuration shared by
//! every component of the bookkeeping backend.

pub mod config;
pub mod duplicate;
pub mod error;
pub mod models;
pub mod validate;

pub use config::{Config, ConfigError, VectorBackendKind};
pub use duplicate::DuplicateProbe;
pub use error::{LedgerError, LedgerResult};
pub use models::*;
pub use validate::{validate_receipt, ValidationError, MINOR_UNIT_TOLERANCE};
