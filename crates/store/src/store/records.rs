//! Record reads, inserts and deletes, and the shared write path.
//!
//! Every write funnels through [`replace_and_reindex`]: one immediate
//! transaction that replaces the record row, lets the cascading foreign
//! keys drop the old index entries, derives fresh entries through the
//! injected indexer, and commits the lot together. A failure anywhere in
//! that sequence rolls the whole write back.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use crate::codec::ResourceCodec;
use crate::error::StoreResult;
use crate::index::{ResourceIndexer, local_last_updated_index};
use crate::types::{Resource, ResourceType, StoredResource};

use super::{ResourceStore, corrupt_row, run_blocking, writer};

impl ResourceStore {
    /// Looks up a record by its external identity.
    pub async fn get(
        &self,
        resource_type: ResourceType,
        logical_id: &str,
    ) -> StoreResult<Option<StoredResource>> {
        let conn = self.connection()?;
        let logical_id = logical_id.to_string();
        run_blocking(move || find_by_identity(&conn, resource_type, &logical_id)).await
    }

    /// Looks up a record by its internal identity.
    pub async fn get_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<StoredResource>> {
        let conn = self.connection()?;
        run_blocking(move || find_by_uuid(&conn, uuid)).await
    }

    /// Inserts a record created on this device.
    ///
    /// A fresh uuid becomes the record's internal identity; when the payload
    /// carries no logical id, the uuid string is written into it before
    /// encoding, so no record is ever stored without an external identity.
    /// `at` is the edit instant, usually `Utc::now()`, and becomes the
    /// record's `lastUpdatedLocal` provenance.
    ///
    /// Inserting over an existing `(type, logical id)` pair replaces that
    /// record, old index entries included.
    pub async fn insert_local(&self, resource: Resource, at: DateTime<Utc>) -> StoreResult<Uuid> {
        let mut conn = self.connection()?;
        let indexer = self.indexer.clone();
        let codec = self.codec.clone();
        run_blocking(move || {
            insert_resource(
                &mut conn,
                indexer.as_ref(),
                codec.as_ref(),
                resource,
                Some(at),
            )
        })
        .await
    }

    /// Inserts several locally created records, one write transaction each.
    ///
    /// Records are written in order; an error stops the remainder but leaves
    /// already written records in place. Returns the assigned uuids in input
    /// order.
    pub async fn insert_all_local(
        &self,
        resources: Vec<Resource>,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let mut uuids = Vec::with_capacity(resources.len());
        for resource in resources {
            uuids.push(self.insert_local(resource, at).await?);
        }
        Ok(uuids)
    }

    /// Removes a record by its external identity.
    ///
    /// Index entries cascade away with the record row. Returns whether a
    /// record was actually removed.
    pub async fn delete(
        &self,
        resource_type: ResourceType,
        logical_id: &str,
    ) -> StoreResult<bool> {
        let conn = self.connection()?;
        let logical_id = logical_id.to_string();
        run_blocking(move || delete_by_identity(&conn, resource_type, &logical_id)).await
    }
}

type RowParts = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str = "resource_uuid, resource_type, resource_id, serialized_resource,
    version_id, last_updated_remote, last_updated_local";

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_row(parts: RowParts) -> StoreResult<StoredResource> {
    let (uuid, resource_type, logical_id, payload, version_id, remote, local) = parts;
    Ok(StoredResource {
        uuid: Uuid::parse_str(&uuid)
            .map_err(|err| corrupt_row(format!("bad resource_uuid {uuid}: {err}")))?,
        resource_type: resource_type
            .parse()
            .map_err(|err| corrupt_row(format!("bad resource_type: {err}")))?,
        logical_id,
        payload,
        version_id,
        last_updated_remote: remote.as_deref().map(parse_instant).transpose()?,
        last_updated_local: local.as_deref().map(parse_instant).transpose()?,
    })
}

fn parse_instant(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| corrupt_row(format!("bad instant {s}: {err}")))
}

pub(super) fn find_by_identity(
    conn: &Connection,
    resource_type: ResourceType,
    logical_id: &str,
) -> StoreResult<Option<StoredResource>> {
    let result = conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM resources
             WHERE resource_type = ?1 AND resource_id = ?2"
        ),
        params![resource_type.as_str(), logical_id],
        row_to_parts,
    );

    match result {
        Ok(parts) => Ok(Some(decode_row(parts)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(super) fn find_by_uuid(conn: &Connection, uuid: Uuid) -> StoreResult<Option<StoredResource>> {
    let result = conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM resources WHERE resource_uuid = ?1"),
        params![uuid.to_string()],
        row_to_parts,
    );

    match result {
        Ok(parts) => Ok(Some(decode_row(parts)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn delete_by_identity(
    conn: &Connection,
    resource_type: ResourceType,
    logical_id: &str,
) -> StoreResult<bool> {
    let rows = conn.execute(
        "DELETE FROM resources WHERE resource_type = ?1 AND resource_id = ?2",
        params![resource_type.as_str(), logical_id],
    )?;
    if rows > 0 {
        tracing::debug!(resource_type = %resource_type, logical_id, "record deleted");
    }
    Ok(rows > 0)
}

/// Builds the row for a new record and writes it through the shared path.
pub(super) fn insert_resource(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    codec: &dyn ResourceCodec,
    mut resource: Resource,
    last_updated_local: Option<DateTime<Utc>>,
) -> StoreResult<Uuid> {
    let uuid = Uuid::new_v4();
    let logical_id = match resource.logical_id() {
        Some(id) => id.to_string(),
        None => {
            let id = uuid.to_string();
            resource.set_logical_id(&id);
            id
        }
    };

    let row = StoredResource {
        uuid,
        resource_type: resource.resource_type(),
        logical_id,
        payload: codec.encode(&resource)?,
        version_id: resource.version_id().map(str::to_string),
        last_updated_remote: resource.last_updated(),
        last_updated_local,
    };

    replace_and_reindex(conn, indexer, &row, &resource)?;
    Ok(uuid)
}

/// Writes one record row and its freshly derived index entries atomically.
///
/// The `INSERT OR REPLACE` clears any previous row holding either of the
/// record's identities, and the cascading foreign keys clear that row's
/// index entries with it. The indexer runs inside the same transaction;
/// its failure, or any write failure, rolls everything back to the
/// pre-write state.
pub(super) fn replace_and_reindex(
    conn: &mut Connection,
    indexer: &dyn ResourceIndexer,
    row: &StoredResource,
    resource: &Resource,
) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT OR REPLACE INTO resources
         (resource_uuid, resource_type, resource_id, serialized_resource,
          version_id, last_updated_remote, last_updated_local)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.uuid.to_string(),
            row.resource_type.as_str(),
            row.logical_id,
            row.payload,
            row.version_id,
            row.last_updated_remote.map(|t| t.to_rfc3339()),
            row.last_updated_local.map(|t| t.to_rfc3339()),
        ],
    )?;

    let mut indices = indexer.index(resource)?;
    if let Some(at) = row.last_updated_local {
        indices
            .date_time_indexes
            .push(local_last_updated_index(row.resource_type, at));
    }
    let entries = indices.into_entries();
    let written = writer::insert_entries(&tx, row.uuid, row.resource_type, &entries)?;

    tx.commit()?;
    tracing::debug!(
        resource_type = %row.resource_type,
        uuid = %row.uuid,
        entries = written,
        "record written and reindexed"
    );
    Ok(())
}
