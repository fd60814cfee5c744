//! SQLite schema definitions and versioning.
//!
//! The table layout is a public contract: search plan compilers build raw
//! SQL against it and hand the result to
//! [`query_records`](crate::ResourceStore::query_records). One `resources`
//! table holds the records themselves; nine sibling tables hold the derived
//! index entries, one table per entry kind, each row pointing back at its
//! owning record via `resource_uuid` with `ON DELETE CASCADE`.
//!
//! Record rows:
//!
//! | column                | type | meaning                                   |
//! |-----------------------|------|-------------------------------------------|
//! | `resource_uuid`       | TEXT | internal identity, hyphenated UUID        |
//! | `resource_type`       | TEXT | canonical resource type name              |
//! | `resource_id`         | TEXT | external logical id                       |
//! | `serialized_resource` | TEXT | payload as produced by the codec          |
//! | `version_id`          | TEXT | server version marker, nullable           |
//! | `last_updated_remote` | TEXT | RFC 3339 server instant, nullable         |
//! | `last_updated_local`  | TEXT | RFC 3339 on-device edit instant, nullable |
//!
//! Index rows share `resource_uuid`, `resource_type`, `index_name` and
//! `index_path` columns; the value columns vary by kind. Date and date-time
//! ranges are stored as half-open `[index_from, index_to)` intervals in
//! epoch milliseconds.

use rusqlite::Connection;

use crate::error::{BackendError, StoreError, StoreResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_RESOURCES_TABLE: &str = "CREATE TABLE IF NOT EXISTS resources (
    resource_uuid TEXT PRIMARY KEY NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    serialized_resource TEXT NOT NULL,
    version_id TEXT,
    last_updated_remote TEXT,
    last_updated_local TEXT
)";

// Every index table points back at its owning record; replacing or deleting
// the record row drops the derived rows in the same statement.
const CREATE_INDEX_TABLES: [&str; 9] = [
    "CREATE TABLE IF NOT EXISTS string_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reference_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS token_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_system TEXT,
        index_value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS quantity_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_system TEXT,
        index_unit TEXT,
        index_value REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS uri_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS date_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_from INTEGER NOT NULL,
        index_to INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS date_time_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_from INTEGER NOT NULL,
        index_to INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS number_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        index_value REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS position_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_uuid TEXT NOT NULL REFERENCES resources(resource_uuid) ON DELETE CASCADE,
        resource_type TEXT NOT NULL,
        index_name TEXT NOT NULL,
        index_path TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL
    )",
];

const CREATE_SECONDARY_INDEXES: [&str; 19] = [
    // External identity lookups; UNIQUE so replace-on-conflict fires for
    // re-synced records that kept their logical id but not their uuid
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_resources_identity
        ON resources(resource_type, resource_id)",
    // Value search paths, one per index table
    "CREATE INDEX IF NOT EXISTS idx_string_search
        ON string_indexes(resource_type, index_name, index_value)",
    "CREATE INDEX IF NOT EXISTS idx_reference_search
        ON reference_indexes(resource_type, index_name, index_value)",
    "CREATE INDEX IF NOT EXISTS idx_token_search
        ON token_indexes(resource_type, index_name, index_value, index_system)",
    "CREATE INDEX IF NOT EXISTS idx_quantity_search
        ON quantity_indexes(resource_type, index_name, index_value)",
    "CREATE INDEX IF NOT EXISTS idx_uri_search
        ON uri_indexes(resource_type, index_name, index_value)",
    "CREATE INDEX IF NOT EXISTS idx_date_search
        ON date_indexes(resource_type, index_name, index_from, index_to)",
    "CREATE INDEX IF NOT EXISTS idx_date_time_search
        ON date_time_indexes(resource_type, index_name, index_from, index_to)",
    "CREATE INDEX IF NOT EXISTS idx_number_search
        ON number_indexes(resource_type, index_name, index_value)",
    "CREATE INDEX IF NOT EXISTS idx_position_search
        ON position_indexes(resource_type, index_name, latitude, longitude)",
    // Owner lookups, needed for cascade enforcement and per-record deletes
    "CREATE INDEX IF NOT EXISTS idx_string_owner ON string_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_reference_owner ON reference_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_token_owner ON token_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_quantity_owner ON quantity_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_uri_owner ON uri_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_date_owner ON date_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_date_time_owner ON date_time_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_number_owner ON number_indexes(resource_uuid)",
    "CREATE INDEX IF NOT EXISTS idx_position_owner ON position_indexes(resource_uuid)",
];

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StoreResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!(version = SCHEMA_VERSION, "database schema created");
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Backend(BackendError::Migration {
            message: format!(
                "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
            ),
        }));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StoreResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StoreResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StoreResult<()> {
    conn.execute(CREATE_RESOURCES_TABLE, [])?;

    for table_sql in &CREATE_INDEX_TABLES {
        conn.execute(table_sql, [])?;
    }

    for index_sql in &CREATE_SECONDARY_INDEXES {
        conn.execute(index_sql, [])?;
    }

    Ok(())
}
