//! Reconciliation between on-device edits and server state.
//!
//! These operations all preserve the internal uuid of a record across
//! external identity changes, and they never mix the two provenance
//! channels: local writes stamp `last_updated_local`, remote writes stamp
//! `last_updated_remote`, and each leaves the other alone.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::codec::ResourceCodec;
use crate::error::{ResourceError, StoreError, StoreResult};
use crate::index::ResourceIndexer;
use crate::types::{Resource, ResourceType, StoredResource};

use super::{ResourceStore, records, run_blocking};

/// The outcome of one record within a remote batch.
///
/// A failed record never aborts its siblings; callers inspect the outcomes
/// to decide what to retry.
#[derive(Debug)]
pub struct RemoteBatchEntry {
    /// The type the incoming record declared.
    pub resource_type: ResourceType,
    /// The logical id the incoming record carried, if any.
    pub logical_id: Option<String>,
    /// The uuid now holding the record, or why it was rejected.
    pub outcome: Result<Uuid, StoreError>,
}

impl ResourceStore {
    /// Records an edit made on this device.
    ///
    /// The record is matched by the payload's external identity and fails
    /// with [`ResourceError::NotFound`] when absent; edits never create
    /// records. The stored payload is replaced, `lastUpdatedLocal` is set
    /// to `at`, and `lastUpdatedRemote` moves only if the payload itself
    /// carries a newer `meta.lastUpdated`. The server version marker is
    /// kept as it was.
    pub async fn apply_local_edit(&self, resource: Resource, at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.connection()?;
        let indexer = self.indexer.clone();
        let codec = self.codec.clone();
        run_blocking(move || {
            apply_local_edit(&mut conn, indexer.as_ref(), codec.as_ref(), &resource, at)
        })
        .await
    }

    /// Folds a batch of server records into the store.
    ///
    /// Each record is matched by external identity: a match is updated in
    /// place under its existing uuid, anything else is inserted under a
    /// fresh uuid with no local provenance. Records are processed in input
    /// order, one write transaction each, and a failure is captured in
    /// that record's outcome without aborting the rest. Cancelling the
    /// future between records leaves the records already processed in
    /// place.
    pub async fn apply_remote_batch(&self, resources: Vec<Resource>) -> Vec<RemoteBatchEntry> {
        let mut entries = Vec::with_capacity(resources.len());
        for resource in resources {
            let resource_type = resource.resource_type();
            let logical_id = resource.logical_id().map(str::to_string);
            let outcome = self.upsert_remote(resource).await;
            if let Err(err) = &outcome {
                tracing::warn!(
                    resource_type = %resource_type,
                    logical_id = logical_id.as_deref().unwrap_or("<none>"),
                    error = %err,
                    "remote record rejected"
                );
            }
            entries.push(RemoteBatchEntry {
                resource_type,
                logical_id,
                outcome,
            });
        }
        entries
    }

    /// Replaces the record held under `uuid` with a new payload, adopting
    /// the payload's external identity.
    ///
    /// This is the server-rename path: when an upload acknowledgment
    /// assigns a permanent logical id, the record keeps its uuid (and with
    /// it every index entry ownership and local provenance) while its
    /// external identity changes. Version marker and remote timestamp are
    /// taken from the payload when present, otherwise kept.
    pub async fn update_with_uuid(&self, uuid: Uuid, resource: Resource) -> StoreResult<()> {
        let mut conn = self.connection()?;
        let indexer = self.indexer.clone();
        let codec = self.codec.clone();
        run_blocking(move || {
            update_with_uuid(&mut conn, indexer.as_ref(), codec.as_ref(), uuid, &resource)
        })
        .await
    }

    /// Applies an upload acknowledgment: stamps the server's version marker
    /// and timestamp onto a record without changing its clinical content.
    ///
    /// The stored payload is decoded, its metadata updated, and the result
    /// written back through the uuid path so indexes over version and
    /// timestamp stay consistent. Fails with [`ResourceError::NotFound`]
    /// when the record no longer exists.
    pub async fn apply_remote_version_bump(
        &self,
        resource_type: ResourceType,
        logical_id: &str,
        version_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.connection()?;
        let indexer = self.indexer.clone();
        let codec = self.codec.clone();
        let logical_id = logical_id.to_string();
        let version_id = version_id.map(str::to_string);
        run_blocking(move || {
            remote_version_bump(
                &mut conn,
                indexer.as_ref(),
                codec.as_ref(),
                resource_type,
                &logical_id,
                version_id.as_deref(),
                at,
            )
        })
        .await
    }

    async fn upsert_remote(&self, resource: Resource) -> StoreResult<Uuid> {
        let mut conn = self.connection()?;
        let indexer = self.indexer.clone();
        let codec = self.codec.clone();
        run_blocking(move || {
            upsert_remote(&mut conn, indexer.as_ref(), codec.as_ref(), resource)
        })
        .await
    }
}

fn apply_local_edit(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    codec: &dyn ResourceCodec,
    resource: &Resource,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    let logical_id = resource.logical_id().unwrap_or_default();
    let existing = records::find_by_identity(conn, resource.resource_type(), logical_id)?
        .ok_or_else(|| ResourceError::NotFound {
            resource_type: resource.resource_type(),
            logical_id: logical_id.to_string(),
        })?;

    let row = StoredResource {
        payload: codec.encode(resource)?,
        last_updated_local: Some(at),
        last_updated_remote: resource.last_updated().or(existing.last_updated_remote),
        ..existing
    };
    records::replace_and_reindex(conn, indexer, &row, resource)
}

fn upsert_remote(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    codec: &dyn ResourceCodec,
    resource: Resource,
) -> StoreResult<Uuid> {
    let existing = match resource.logical_id() {
        Some(id) => records::find_by_identity(conn, resource.resource_type(), id)?,
        None => None,
    };

    match existing {
        Some(existing) => {
            let uuid = existing.uuid;
            // The incoming record is authoritative for server metadata,
            // absent values included; local provenance is untouched
            let row = StoredResource {
                payload: codec.encode(&resource)?,
                version_id: resource.version_id().map(str::to_string),
                last_updated_remote: resource.last_updated(),
                ..existing
            };
            records::replace_and_reindex(conn, indexer, &row, &resource)?;
            Ok(uuid)
        }
        None => records::insert_resource(conn, indexer, codec, resource, None),
    }
}

fn update_with_uuid(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    codec: &dyn ResourceCodec,
    uuid: Uuid,
    resource: &Resource,
) -> StoreResult<()> {
    let existing = records::find_by_uuid(conn, uuid)?
        .ok_or(ResourceError::UuidNotFound { uuid })?;

    let row = StoredResource {
        logical_id: resource.logical_id().unwrap_or_default().to_string(),
        payload: codec.encode(resource)?,
        version_id: resource
            .version_id()
            .map(str::to_string)
            .or_else(|| existing.version_id.clone()),
        last_updated_remote: resource.last_updated().or(existing.last_updated_remote),
        ..existing
    };
    records::replace_and_reindex(conn, indexer, &row, resource)
}

fn remote_version_bump(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    codec: &dyn ResourceCodec,
    resource_type: ResourceType,
    logical_id: &str,
    version_id: Option<&str>,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    let existing = records::find_by_identity(conn, resource_type, logical_id)?.ok_or_else(|| {
        ResourceError::NotFound {
            resource_type,
            logical_id: logical_id.to_string(),
        }
    })?;

    let mut resource = codec.decode(existing.payload(), resource_type)?;
    resource.update_meta(version_id, Some(at));
    update_with_uuid(conn, indexer, codec, existing.uuid(), &resource)
}
