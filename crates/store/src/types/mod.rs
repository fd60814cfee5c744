//! Core record types shared across the store.

mod resource;
mod resource_type;
mod stored;

pub use resource::{InvalidResourceKey, Resource, ResourceKey};
pub use resource_type::{ResourceType, UnknownResourceType};
pub use stored::StoredResource;
