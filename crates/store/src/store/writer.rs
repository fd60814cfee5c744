//! Batch insertion of derived index entries.
//!
//! One entry point accepts any mix of tagged [`IndexEntry`] values and
//! routes each row to its kind's table. Callers run this inside the same
//! transaction that wrote the owning record row.

use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::index::IndexEntry;
use crate::types::ResourceType;

const INSERT_STRING: &str = "INSERT INTO string_indexes
    (resource_uuid, resource_type, index_name, index_path, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const INSERT_REFERENCE: &str = "INSERT INTO reference_indexes
    (resource_uuid, resource_type, index_name, index_path, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const INSERT_TOKEN: &str = "INSERT INTO token_indexes
    (resource_uuid, resource_type, index_name, index_path, index_system, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const INSERT_QUANTITY: &str = "INSERT INTO quantity_indexes
    (resource_uuid, resource_type, index_name, index_path, index_system, index_unit, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const INSERT_URI: &str = "INSERT INTO uri_indexes
    (resource_uuid, resource_type, index_name, index_path, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const INSERT_DATE: &str = "INSERT INTO date_indexes
    (resource_uuid, resource_type, index_name, index_path, index_from, index_to)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const INSERT_DATE_TIME: &str = "INSERT INTO date_time_indexes
    (resource_uuid, resource_type, index_name, index_path, index_from, index_to)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const INSERT_NUMBER: &str = "INSERT INTO number_indexes
    (resource_uuid, resource_type, index_name, index_path, index_value)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const INSERT_POSITION: &str = "INSERT INTO position_indexes
    (resource_uuid, resource_type, index_name, index_path, latitude, longitude)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Inserts every entry under the given owning record.
///
/// Returns the number of rows written.
pub(crate) fn insert_entries(
    conn: &Connection,
    uuid: Uuid,
    resource_type: ResourceType,
    entries: &[IndexEntry],
) -> StoreResult<usize> {
    let uuid = uuid.to_string();
    let resource_type = resource_type.as_str();

    let mut written = 0;
    for entry in entries {
        written += insert_entry(conn, &uuid, resource_type, entry)?;
    }
    Ok(written)
}

fn insert_entry(
    conn: &Connection,
    uuid: &str,
    resource_type: &str,
    entry: &IndexEntry,
) -> rusqlite::Result<usize> {
    match entry {
        IndexEntry::String(ix) => conn.prepare_cached(INSERT_STRING)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.value
        ]),
        IndexEntry::Reference(ix) => conn.prepare_cached(INSERT_REFERENCE)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.value
        ]),
        IndexEntry::Token(ix) => conn.prepare_cached(INSERT_TOKEN)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.system,
            ix.value
        ]),
        IndexEntry::Quantity(ix) => conn.prepare_cached(INSERT_QUANTITY)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.system,
            ix.unit,
            ix.value
        ]),
        IndexEntry::Uri(ix) => conn.prepare_cached(INSERT_URI)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.uri
        ]),
        IndexEntry::Date(ix) => conn.prepare_cached(INSERT_DATE)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.from.timestamp_millis(),
            ix.to.timestamp_millis()
        ]),
        IndexEntry::DateTime(ix) => conn.prepare_cached(INSERT_DATE_TIME)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.from.timestamp_millis(),
            ix.to.timestamp_millis()
        ]),
        IndexEntry::Number(ix) => conn.prepare_cached(INSERT_NUMBER)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.value
        ]),
        IndexEntry::Position(ix) => conn.prepare_cached(INSERT_POSITION)?.execute(params![
            uuid,
            resource_type,
            ix.name,
            ix.path,
            ix.latitude,
            ix.longitude
        ]),
    }
}
