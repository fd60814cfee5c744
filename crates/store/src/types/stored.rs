//! The persisted view of a record row.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::resource::ResourceKey;
use crate::types::resource_type::ResourceType;

/// A record as the store holds it: the serialized payload plus the row
/// metadata that never travels inside the payload itself.
///
/// The `uuid` is the store's internal identity and survives server renames;
/// the logical id is the external identity and may change. The two
/// `last_updated` instants are independent provenance channels: local records
/// the latest on-device edit, remote the latest server-acknowledged state.
#[derive(Debug, Clone)]
pub struct StoredResource {
    pub(crate) uuid: Uuid,
    pub(crate) resource_type: ResourceType,
    pub(crate) logical_id: String,
    pub(crate) payload: String,
    pub(crate) version_id: Option<String>,
    pub(crate) last_updated_remote: Option<DateTime<Utc>>,
    pub(crate) last_updated_local: Option<DateTime<Utc>>,
}

impl StoredResource {
    /// The internal identity of this record.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The record's type.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The record's external identifier.
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// The serialized payload exactly as the codec produced it.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The version marker assigned by the server, if any.
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// When the server last acknowledged this record, if ever.
    pub fn last_updated_remote(&self) -> Option<DateTime<Utc>> {
        self.last_updated_remote
    }

    /// When this record was last edited on-device, if ever.
    pub fn last_updated_local(&self) -> Option<DateTime<Utc>> {
        self.last_updated_local
    }

    /// Whether this record carries an on-device edit.
    pub fn has_local_change(&self) -> bool {
        self.last_updated_local.is_some()
    }

    /// The external identity of this record.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type, self.logical_id.clone())
    }
}
