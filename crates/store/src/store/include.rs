//! Reference joins and the compiled-query escape hatch.
//!
//! Reference index entries store their target as a `Type/id` string, so
//! both join directions resolve against the record table without ever
//! decoding a payload: forward joins follow entries owned by the base
//! records to the records they name, reverse joins find the records whose
//! entries name a base record.
//!
//! Search compilation lives above this crate. A compiler that knows the
//! table layout (see [`schema`](super::schema)) hands its finished SQL to
//! [`ResourceStore::query_records`] or [`ResourceStore::count_records`]
//! and the store only binds and executes it.

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{ResourceKey, ResourceType};

use super::{ResourceStore, corrupt_row, run_blocking};

/// One reference parameter to follow during an include join.
#[derive(Debug, Clone)]
pub struct IncludeSpec {
    resource_type: ResourceType,
    index_name: String,
}

impl IncludeSpec {
    /// Names a reference parameter, e.g. `subject` as indexed on
    /// `Observation`.
    ///
    /// For a forward join `resource_type` is the type of the base records;
    /// for a reverse join it is the type of the referring records.
    pub fn new(resource_type: ResourceType, index_name: impl Into<String>) -> Self {
        Self {
            resource_type,
            index_name: index_name.into(),
        }
    }
}

/// A record reached by following a reference out of a base record.
#[derive(Debug, Clone)]
pub struct ForwardIncludeMatch {
    /// The reference parameter that was followed.
    pub index_name: String,
    /// The base record owning the reference.
    pub base_uuid: Uuid,
    /// The referenced record's stored payload.
    pub payload: String,
}

/// A record that references one of the base records.
#[derive(Debug, Clone)]
pub struct ReverseIncludeMatch {
    /// The reference parameter the referring record matched on.
    pub index_name: String,
    /// The external identity of the base record being referenced.
    pub base_key: ResourceKey,
    /// The referring record's stored payload.
    pub payload: String,
}

/// One row produced by a compiled record query.
#[derive(Debug, Clone)]
pub struct QueriedRecord {
    /// Internal identity of the matched record.
    pub uuid: Uuid,
    /// The matched record's stored payload.
    pub payload: String,
}

/// A positional argument for a compiled query.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum QueryArg {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        QueryArg::Text(value.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        QueryArg::Text(value)
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        QueryArg::Integer(value)
    }
}

impl From<f64> for QueryArg {
    fn from(value: f64) -> Self {
        QueryArg::Real(value)
    }
}

impl ToSql for QueryArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryArg::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            QueryArg::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            QueryArg::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            QueryArg::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// SQL compiled by a higher layer, ready to bind and run.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    sql: String,
    args: Vec<QueryArg>,
}

impl CompiledQuery {
    /// Wraps a finished SQL string with no arguments yet.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Appends one positional argument.
    pub fn with_arg(mut self, arg: impl Into<QueryArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The SQL to execute.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The bound arguments, in positional order.
    pub fn args(&self) -> &[QueryArg] {
        &self.args
    }
}

impl ResourceStore {
    /// Fetches the records referenced by the given base records.
    ///
    /// Each spec names a reference parameter on the base type; every entry
    /// of that parameter owned by one of `base_uuids` is followed to the
    /// record it names, skipping references whose target is not stored.
    /// Matches are grouped by spec in input order. Empty bases or specs
    /// yield no matches without touching the database.
    pub async fn forward_include(
        &self,
        base_uuids: &[Uuid],
        specs: &[IncludeSpec],
    ) -> StoreResult<Vec<ForwardIncludeMatch>> {
        if base_uuids.is_empty() || specs.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let base_uuids = base_uuids.to_vec();
        let specs = specs.to_vec();
        run_blocking(move || forward_include(&conn, &base_uuids, &specs)).await
    }

    /// Fetches the records that reference the given base records.
    ///
    /// Each spec names a reference parameter on the referring type; every
    /// record holding an entry of that parameter whose value is one of the
    /// base identities is returned, tagged with the base identity it
    /// referenced. Matches are grouped by spec in input order. Empty bases
    /// or specs yield no matches without touching the database.
    pub async fn reverse_include(
        &self,
        base_keys: &[ResourceKey],
        specs: &[IncludeSpec],
    ) -> StoreResult<Vec<ReverseIncludeMatch>> {
        if base_keys.is_empty() || specs.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let base_keys = base_keys.to_vec();
        let specs = specs.to_vec();
        run_blocking(move || reverse_include(&conn, &base_keys, &specs)).await
    }

    /// Runs a compiled query and returns the matched records.
    ///
    /// The query's first column must be a record uuid and its second the
    /// serialized payload, which every query selecting
    /// `resource_uuid, serialized_resource` from the record table satisfies.
    pub async fn query_records(&self, query: CompiledQuery) -> StoreResult<Vec<QueriedRecord>> {
        let conn = self.connection()?;
        run_blocking(move || run_record_query(&conn, &query)).await
    }

    /// Runs a compiled aggregate and returns its single value.
    ///
    /// The query must produce one row whose first column is a non-negative
    /// integer, the shape of a `SELECT COUNT(*)`.
    pub async fn count_records(&self, query: CompiledQuery) -> StoreResult<u64> {
        let conn = self.connection()?;
        run_blocking(move || run_count_query(&conn, &query)).await
    }
}

fn forward_include(
    conn: &Connection,
    base_uuids: &[Uuid],
    specs: &[IncludeSpec],
) -> StoreResult<Vec<ForwardIncludeMatch>> {
    let placeholders: Vec<String> = (0..base_uuids.len())
        .map(|i| format!("?{}", i + 3))
        .collect();
    let sql = format!(
        "SELECT ri.index_name, ri.resource_uuid, target.serialized_resource
         FROM reference_indexes ri
         JOIN resources target
           ON ri.index_value = target.resource_type || '/' || target.resource_id
         WHERE ri.resource_type = ?1 AND ri.index_name = ?2
           AND ri.resource_uuid IN ({})",
        placeholders.join(",")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut matches = Vec::new();
    for spec in specs {
        let mut args: Vec<Box<dyn ToSql>> = vec![
            Box::new(spec.resource_type.as_str()),
            Box::new(spec.index_name.clone()),
        ];
        for uuid in base_uuids {
            args.push(Box::new(uuid.to_string()));
        }
        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();

        let rows = stmt.query_map(arg_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (index_name, uuid, payload) = row?;
            matches.push(ForwardIncludeMatch {
                index_name,
                base_uuid: Uuid::parse_str(&uuid)
                    .map_err(|err| corrupt_row(format!("bad resource_uuid {uuid}: {err}")))?,
                payload,
            });
        }
    }
    Ok(matches)
}

fn reverse_include(
    conn: &Connection,
    base_keys: &[ResourceKey],
    specs: &[IncludeSpec],
) -> StoreResult<Vec<ReverseIncludeMatch>> {
    let placeholders: Vec<String> = (0..base_keys.len())
        .map(|i| format!("?{}", i + 3))
        .collect();
    let sql = format!(
        "SELECT ri.index_name, ri.index_value, owner.serialized_resource
         FROM reference_indexes ri
         JOIN resources owner ON owner.resource_uuid = ri.resource_uuid
         WHERE ri.resource_type = ?1 AND ri.index_name = ?2
           AND ri.index_value IN ({})",
        placeholders.join(",")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut matches = Vec::new();
    for spec in specs {
        let mut args: Vec<Box<dyn ToSql>> = vec![
            Box::new(spec.resource_type.as_str()),
            Box::new(spec.index_name.clone()),
        ];
        for key in base_keys {
            args.push(Box::new(key.to_string()));
        }
        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();

        let rows = stmt.query_map(arg_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (index_name, value, payload) = row?;
            matches.push(ReverseIncludeMatch {
                index_name,
                base_key: value
                    .parse()
                    .map_err(|err| corrupt_row(format!("bad reference value {value}: {err}")))?,
                payload,
            });
        }
    }
    Ok(matches)
}

fn run_record_query(conn: &Connection, query: &CompiledQuery) -> StoreResult<Vec<QueriedRecord>> {
    let mut stmt = conn.prepare(query.sql())?;
    let rows = stmt.query_map(params_from_iter(query.args()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (uuid, payload) = row?;
        records.push(QueriedRecord {
            uuid: Uuid::parse_str(&uuid)
                .map_err(|err| corrupt_row(format!("bad resource_uuid {uuid}: {err}")))?,
            payload,
        });
    }
    Ok(records)
}

fn run_count_query(conn: &Connection, query: &CompiledQuery) -> StoreResult<u64> {
    let count: i64 = conn.query_row(query.sql(), params_from_iter(query.args()), |row| {
        row.get(0)
    })?;
    u64::try_from(count).map_err(|_| corrupt_row(format!("count query returned {count}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::error::IndexError;
    use crate::index::{ReferenceIndex, ResourceIndexer, ResourceIndices};
    use crate::store::{records, schema};
    use crate::types::Resource;
    use serde_json::json;

    struct SubjectIndexer;

    impl ResourceIndexer for SubjectIndexer {
        fn index(&self, resource: &Resource) -> Result<ResourceIndices, IndexError> {
            let mut indices = ResourceIndices::default();
            if let Some(reference) = resource
                .content()
                .pointer("/subject/reference")
                .and_then(|v| v.as_str())
            {
                indices.reference_indexes.push(ReferenceIndex::new(
                    "subject",
                    format!("{}.subject", resource.resource_type()),
                    reference,
                ));
            }
            Ok(indices)
        }
    }

    fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        schema::initialize_schema(&conn).unwrap();
        conn
    }

    fn insert(conn: &mut Connection, content: serde_json::Value) -> Uuid {
        let resource = Resource::from_content(content).unwrap();
        records::insert_resource(conn, &SubjectIndexer, &JsonCodec, resource, None).unwrap()
    }

    #[test]
    fn test_forward_include_reaches_referenced_record() {
        let mut conn = test_connection();
        insert(&mut conn, json!({"resourceType": "Patient", "id": "p1"}));
        let obs = insert(
            &mut conn,
            json!({
                "resourceType": "Observation",
                "id": "o1",
                "subject": {"reference": "Patient/p1"}
            }),
        );

        let specs = [IncludeSpec::new(ResourceType::Observation, "subject")];
        let matches = forward_include(&conn, &[obs], &specs).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index_name, "subject");
        assert_eq!(matches[0].base_uuid, obs);
        assert!(matches[0].payload.contains("\"p1\""));
    }

    #[test]
    fn test_forward_include_skips_unresolved_reference() {
        let mut conn = test_connection();
        let obs = insert(
            &mut conn,
            json!({
                "resourceType": "Observation",
                "id": "o1",
                "subject": {"reference": "Patient/absent"}
            }),
        );

        let specs = [IncludeSpec::new(ResourceType::Observation, "subject")];
        let matches = forward_include(&conn, &[obs], &specs).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_reverse_include_finds_referring_records() {
        let mut conn = test_connection();
        insert(&mut conn, json!({"resourceType": "Patient", "id": "p1"}));
        insert(&mut conn, json!({"resourceType": "Patient", "id": "p2"}));
        for (id, patient) in [("o1", "p1"), ("o2", "p1"), ("o3", "p2")] {
            insert(
                &mut conn,
                json!({
                    "resourceType": "Observation",
                    "id": id,
                    "subject": {"reference": format!("Patient/{patient}")}
                }),
            );
        }

        let base = [ResourceKey::new(ResourceType::Patient, "p1")];
        let specs = [IncludeSpec::new(ResourceType::Observation, "subject")];
        let matches = reverse_include(&conn, &base, &specs).unwrap();
        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!(m.index_name, "subject");
            assert_eq!(m.base_key, base[0]);
        }
    }

    #[test]
    fn test_compiled_query_binds_args_in_order() {
        let query = CompiledQuery::new("SELECT 1 WHERE ?1 = ?2")
            .with_arg("a")
            .with_arg(2_i64)
            .with_arg(1.5_f64);
        assert_eq!(query.args().len(), 3);
        assert_eq!(query.args()[0], QueryArg::Text("a".to_string()));
        assert_eq!(query.args()[1], QueryArg::Integer(2));
        assert_eq!(query.args()[2], QueryArg::Real(1.5));
    }

    #[test]
    fn test_record_and_count_queries_agree() {
        let mut conn = test_connection();
        insert(&mut conn, json!({"resourceType": "Patient", "id": "p1"}));
        insert(&mut conn, json!({"resourceType": "Patient", "id": "p2"}));
        insert(&mut conn, json!({"resourceType": "Observation", "id": "o1"}));

        let records = run_record_query(
            &conn,
            &CompiledQuery::new(
                "SELECT resource_uuid, serialized_resource FROM resources
                 WHERE resource_type = ?1",
            )
            .with_arg("Patient"),
        )
        .unwrap();
        assert_eq!(records.len(), 2);

        let count = run_count_query(
            &conn,
            &CompiledQuery::new("SELECT COUNT(*) FROM resources WHERE resource_type = ?1")
                .with_arg("Patient"),
        )
        .unwrap();
        assert_eq!(count, 2);
    }
}
