//! Index derivation: the indexer seam and the synthetic local-change entry.

use chrono::{DateTime, Utc};

use crate::error::IndexError;
use crate::types::{Resource, ResourceType};

mod values;

pub use values::{
    DateIndex, DateTimeIndex, IndexEntry, IndexKind, NumberIndex, PositionIndex, QuantityIndex,
    ReferenceIndex, ResourceIndices, StringIndex, TokenIndex, UriIndex,
};

/// The reserved search parameter name under which the store maintains an
/// index over each record's latest on-device edit instant.
///
/// Query builders can range-filter on it like on any other date-time
/// parameter; indexers must not emit entries under this name themselves.
pub const LOCAL_LAST_UPDATED_PARAM: &str = "_lastUpdatedLocal";

/// Derives search index entries from record payloads.
///
/// The store calls this on every write, inside the write's own transaction:
/// the record row and the entries returned here land atomically or not at
/// all. An `Err` aborts the write and leaves both the record and its
/// previous entries untouched.
///
/// Implementations must be pure with respect to the payload: the same
/// payload always yields the same entries. They are invoked from blocking
/// storage threads and may be shared across concurrent writes, hence the
/// `Send + Sync` bound.
pub trait ResourceIndexer: Send + Sync {
    /// Computes all index entries for one record.
    fn index(&self, resource: &Resource) -> Result<ResourceIndices, IndexError>;
}

/// Builds the synthetic entry the store appends for locally edited records.
///
/// The entry lives under [`LOCAL_LAST_UPDATED_PARAM`] with a
/// `Type.meta.lastUpdated` path and the minimal half-open range around the
/// edit instant.
pub fn local_last_updated_index(resource_type: ResourceType, at: DateTime<Utc>) -> DateTimeIndex {
    DateTimeIndex::instant(
        LOCAL_LAST_UPDATED_PARAM,
        format!("{resource_type}.meta.lastUpdated"),
        at,
    )
}
