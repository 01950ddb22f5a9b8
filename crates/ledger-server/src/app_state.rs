//! Shared `axum::State` wiring one instance of every long-lived component
//! together for the handlers in `routes/`.

use std::sync::Arc;

use ledger_completion::CompletionClient;
use ledger_ingest::{Ingestor, ReconciliationQueue};
use ledger_query::QueryPlanner;
use ledger_vector::VectorIndex;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub planner: Arc<QueryPlanner>,
    pub completion: Arc<dyn CompletionClient>,
    pub index: Arc<dyn VectorIndex>,
    pub queue: Arc<ReconciliationQueue>,
}
