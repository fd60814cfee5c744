//! The codec seam between in-memory records and persisted payload strings.

use serde_json::Value;

use crate::error::CodecError;
use crate::types::{Resource, ResourceType};

/// Converts records to and from their persisted payload form.
///
/// The store never interprets payload strings itself; everything that needs
/// the parsed form (reindexing after a metadata bump, for instance) goes
/// through the codec handed in at construction. Encoding then decoding a
/// record must reproduce it exactly.
pub trait ResourceCodec: Send + Sync {
    /// Encodes a record into the string form stored in the payload column.
    fn encode(&self, resource: &Resource) -> Result<String, CodecError>;

    /// Decodes a stored payload back into a record.
    ///
    /// `resource_type` is what the surrounding row says the payload is;
    /// implementations reject payloads declaring anything else.
    fn decode(&self, payload: &str, resource_type: ResourceType) -> Result<Resource, CodecError>;
}

/// The standard codec: payloads are stored as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ResourceCodec for JsonCodec {
    fn encode(&self, resource: &Resource) -> Result<String, CodecError> {
        serde_json::to_string(resource.content()).map_err(|err| CodecError::Serialize {
            message: err.to_string(),
        })
    }

    fn decode(&self, payload: &str, resource_type: ResourceType) -> Result<Resource, CodecError> {
        let content: Value =
            serde_json::from_str(payload).map_err(|err| CodecError::Deserialize {
                message: err.to_string(),
            })?;
        let resource = Resource::from_content(content)?;
        if resource.resource_type() != resource_type {
            return Err(CodecError::TypeMismatch {
                expected: resource_type,
                found: resource.resource_type(),
            });
        }
        Ok(resource)
    }
}
