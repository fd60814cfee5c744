//! Error types for the record store.
//!
//! This module defines all error types used throughout the store, following a
//! hierarchy that separates record state errors, index computation errors,
//! codec errors, and storage backend errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;
use uuid::Uuid;

use crate::types::ResourceType;

/// The primary error type for all store operations.
///
/// This enum encompasses all possible errors that can occur while reading,
/// writing, reindexing, or reconciling records, organized by category.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Index computation errors
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Payload encoding and decoding errors
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// SQLite backend errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// No record exists with the given external identity.
    #[error("resource not found: {resource_type}/{logical_id}")]
    NotFound {
        resource_type: ResourceType,
        logical_id: String,
    },

    /// No record exists with the given internal identity.
    #[error("resource not found for uuid: {uuid}")]
    UuidNotFound { uuid: Uuid },
}

/// Errors raised while deriving index entries from a record.
///
/// Implementors of [`ResourceIndexer`](crate::ResourceIndexer) return these
/// when a payload cannot be turned into index entries. A failure aborts the
/// whole write: the record and its previous index entries are left untouched.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Evaluating a search parameter against the payload failed.
    #[error("search parameter extraction failed: {message}")]
    Extraction { message: String },

    /// The payload is structurally unsuitable for indexing.
    #[error("resource content not indexable: {message}")]
    InvalidContent { message: String },
}

/// Errors raised while encoding or decoding record payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Encoding a resource into its persisted form failed.
    #[error("failed to serialize resource: {message}")]
    Serialize { message: String },

    /// Decoding a persisted payload back into a resource failed.
    #[error("failed to deserialize resource: {message}")]
    Deserialize { message: String },

    /// The payload carries no resource type discriminator.
    #[error("payload is missing a resourceType element")]
    MissingResourceType,

    /// The payload names a type outside the supported enumeration.
    #[error("unknown resource type: {name}")]
    UnknownResourceType { name: String },

    /// The payload declares a different type than the caller asked for.
    #[error("payload declares type {found}, expected {expected}")]
    TypeMismatch {
        expected: ResourceType,
        found: ResourceType,
    },
}

/// Errors originating from the SQLite backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// An error reported by SQLite itself.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Schema creation or migration failed.
    #[error("schema migration failed: {message}")]
    Migration { message: String },

    /// A stored row could not be decoded into its in-memory form.
    #[error("corrupt row: {message}")]
    CorruptRow { message: String },

    /// A blocking storage task could not be joined.
    #[error("storage task failed: {message}")]
    TaskJoin { message: String },
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// Implement conversions from common error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(BackendError::Sqlite(err))
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(_err: r2d2::Error) -> Self {
        StoreError::Backend(BackendError::PoolExhausted)
    }
}
