//! Test infrastructure shared by the store integration tests.

pub mod fixtures;

pub use fixtures::*;

use std::path::Path;
use std::sync::Arc;

use fhir_store::{JsonCodec, ResourceStore};

/// An in-memory store wired with the structural test indexer.
pub fn store() -> ResourceStore {
    ResourceStore::in_memory(Arc::new(TestIndexer), Arc::new(JsonCodec))
        .expect("in-memory store should open")
}

/// A file-backed store at `path`, wired like [`store`].
pub fn file_store(path: &Path) -> ResourceStore {
    ResourceStore::open(path, Arc::new(TestIndexer), Arc::new(JsonCodec))
        .expect("file store should open")
}
