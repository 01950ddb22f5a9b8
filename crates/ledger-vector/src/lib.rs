//! # ledger-vector
//!
//! The Vector Index (§4.2): two interchangeable back-ends — persistent
//! on-disk and in-memory — behind one `VectorIndex` capability set (§9
//! "back-end pluggability").

pub mod document;
pub mod error;
pub mod index;
pub mod memory;
pub mod metadata;
pub mod persistent;
pub mod similarity;

pub use document::build_document_text;
pub use error::VectorError;
pub use index::{IndexEntry, SearchHit, VectorIndex};
pub use memory::InMemoryIndex;
pub use metadata::{build_metadata, matches_filter, Metadata};
pub use persistent::PersistentIndex;

use std::path::Path;
use std::sync::Arc;

use ledger_completion::CompletionClient;
use ledger_core::VectorBackendKind;

/// Build whichever back-end the configuration selects.
pub fn build_vector_index(
    kind: VectorBackendKind,
    vector_path: impl AsRef<Path>,
    embedder: Arc<dyn CompletionClient>,
) -> Result<Arc<dyn VectorIndex>, VectorError> {
    Ok(match kind {
        VectorBackendKind::Memory => Arc::new(InMemoryIndex::new(embedder)) as Arc<dyn VectorIndex>,
        VectorBackendKind::Persistent => {
            Arc::new(PersistentIndex::open(vector_path, embedder)?) as Arc<dyn VectorIndex>
        }
    })
}
