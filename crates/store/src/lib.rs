//! Offline-first persistence core for FHIR clinical records.
//!
//! This crate stores clinical records as opaque serialized payloads in SQLite
//! and keeps a set of typed search index tables in lockstep with them. It is
//! the storage half of a sync engine: records created on-device and records
//! downloaded from a server live side by side, every write refreshes the
//! record's index rows atomically, and reconciliation operations fold server
//! state into the store without losing local provenance.
//!
//! # Features
//!
//! - **Dual identity**: every record has a stable internal uuid and a mutable
//!   external `Type/id` identity, so a server rename never orphans local state
//! - **Atomic reindexing**: payload and index rows change together inside one
//!   transaction; a failed extraction leaves the previous state intact
//! - **Provenance channels**: on-device edits and server acknowledgments stamp
//!   separate timestamps, and locally edited records carry a synthetic
//!   `_lastUpdatedLocal` search entry
//! - **Reference joins**: forward and reverse reference resolution in the
//!   shape of `_include`/`_revinclude`, plus a compiled-query hook for a
//!   search layer built over the documented table layout
//!
//! # Architecture
//!
//! - [`types`] - record payloads, identities, and the resource type enum
//! - [`index`] - typed index values and the extraction trait
//! - [`codec`] - payload serialization trait and the JSON codec
//! - [`store`] - the SQLite store itself
//! - [`error`] - error types for all operations
//!
//! The store never derives index values or payload bytes on its own; callers
//! inject a [`ResourceIndexer`] and a [`ResourceCodec`] at construction.
//! Search semantics, profile rules, and payload format all stay out of the
//! storage layer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fhir_store::error::IndexError;
//! use fhir_store::{JsonCodec, Resource, ResourceIndexer, ResourceIndices, ResourceStore};
//! use serde_json::json;
//!
//! struct MyIndexer;
//!
//! impl ResourceIndexer for MyIndexer {
//!     fn index(&self, _resource: &Resource) -> Result<ResourceIndices, IndexError> {
//!         // Derive typed index values from the payload here.
//!         Ok(ResourceIndices::default())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), fhir_store::StoreError> {
//! let store = ResourceStore::in_memory(Arc::new(MyIndexer), Arc::new(JsonCodec))?;
//!
//! let patient = Resource::from_content(json!({
//!     "resourceType": "Patient",
//!     "name": [{"family": "Osei"}]
//! }))?;
//! let uuid = store.insert_local(patient, chrono::Utc::now()).await?;
//! assert!(store.get_by_uuid(uuid).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod error;
pub mod index;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use codec::{JsonCodec, ResourceCodec};
pub use error::{StoreError, StoreResult};
pub use index::{IndexEntry, IndexKind, ResourceIndexer, ResourceIndices};
pub use store::{
    CompiledQuery, ForwardIncludeMatch, IncludeSpec, QueriedRecord, QueryArg, RemoteBatchEntry,
    ResourceStore, ReverseIncludeMatch, StoreConfig,
};
pub use types::{Resource, ResourceKey, ResourceType, StoredResource};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
