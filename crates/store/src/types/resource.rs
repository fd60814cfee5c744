//! Parsed record payloads and external record identities.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::CodecError;
use crate::types::resource_type::{ResourceType, UnknownResourceType};

/// A parsed clinical record: a JSON payload plus the type it declares.
///
/// This is the form records take at the store boundary. Inside the store the
/// payload travels as an opaque serialized string; a [`ResourceCodec`]
/// converts between the two.
///
/// [`ResourceCodec`]: crate::ResourceCodec
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: ResourceType,
    content: Value,
}

impl Resource {
    /// Builds a resource from raw JSON content.
    ///
    /// The content must be an object carrying a `resourceType` string that
    /// names one of the supported [`ResourceType`]s.
    pub fn from_content(content: Value) -> Result<Self, CodecError> {
        let name = content
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingResourceType)?;
        let resource_type = name
            .parse::<ResourceType>()
            .map_err(|UnknownResourceType(name)| CodecError::UnknownResourceType { name })?;
        Ok(Resource {
            resource_type,
            content,
        })
    }

    /// The type this payload declares.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The raw JSON content.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Consumes the resource, returning its JSON content.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// The external identifier carried in the payload's `id` element.
    ///
    /// An absent or empty `id` is reported as `None`; the store treats both
    /// as "no identifier assigned yet".
    pub fn logical_id(&self) -> Option<&str> {
        self.content
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Overwrites the payload's `id` element.
    pub fn set_logical_id(&mut self, logical_id: &str) {
        if let Some(object) = self.content.as_object_mut() {
            object.insert("id".to_string(), Value::String(logical_id.to_string()));
        }
    }

    /// The version marker carried in `meta.versionId`, if any.
    pub fn version_id(&self) -> Option<&str> {
        self.content
            .get("meta")
            .and_then(|meta| meta.get("versionId"))
            .and_then(Value::as_str)
    }

    /// The instant carried in `meta.lastUpdated`, if present and parseable
    /// as RFC 3339. A malformed instant is treated as absent.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.content
            .get("meta")
            .and_then(|meta| meta.get("lastUpdated"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Writes server-assigned metadata into the payload.
    ///
    /// Only the given fields are touched: a `None` leaves the existing value
    /// in place. The `meta` object is created on demand.
    pub fn update_meta(&mut self, version_id: Option<&str>, last_updated: Option<DateTime<Utc>>) {
        let Some(object) = self.content.as_object_mut() else {
            return;
        };
        let meta = object
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Some(meta) = meta.as_object_mut() {
            if let Some(version_id) = version_id {
                meta.insert(
                    "versionId".to_string(),
                    Value::String(version_id.to_string()),
                );
            }
            if let Some(last_updated) = last_updated {
                meta.insert(
                    "lastUpdated".to_string(),
                    Value::String(last_updated.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
        }
    }

    /// The external identity of this resource, when it carries an `id`.
    pub fn key(&self) -> Option<ResourceKey> {
        self.logical_id()
            .map(|id| ResourceKey::new(self.resource_type, id))
    }
}

/// Error returned when a string does not parse as `Type/id`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid resource key: {0}")]
pub struct InvalidResourceKey(pub String);

/// The external identity of a record: its type plus logical id.
///
/// Rendered as `Type/id`, the same form reference index entries use for
/// their targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// The record's type.
    pub resource_type: ResourceType,
    /// The record's logical id.
    pub logical_id: String,
}

impl ResourceKey {
    /// Builds a key from a type and logical id.
    pub fn new(resource_type: ResourceType, logical_id: impl Into<String>) -> Self {
        ResourceKey {
            resource_type,
            logical_id: logical_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.logical_id)
    }
}

impl FromStr for ResourceKey {
    type Err = InvalidResourceKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, logical_id) = s
            .split_once('/')
            .ok_or_else(|| InvalidResourceKey(s.to_string()))?;
        if logical_id.is_empty() {
            return Err(InvalidResourceKey(s.to_string()));
        }
        let resource_type = type_name
            .parse::<ResourceType>()
            .map_err(|_| InvalidResourceKey(s.to_string()))?;
        Ok(ResourceKey::new(resource_type, logical_id))
    }
}
