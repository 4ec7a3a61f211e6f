//! Case stores: in-memory for tests and embedding, local file-backed for the CLI.

mod error;
pub use error::StoreError;

mod local;
pub use local::{CASE_LOG, EVIDENCE_DIR, LocalCaseStore};

mod memory;
pub use memory::InMemoryCaseStore;
