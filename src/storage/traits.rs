//! Abstract storage traits.
//!
//! The engine reads Identity and Variant rows through [`RecordStore`] and
//! hands it the queries it builds. Persistence, transactions and mapping stay
//! with the host; the in-memory backend exists for tests and embedded use.

use thiserror::Error;

use crate::query::Query;
use crate::record::{EntityType, Record, RecordId};
use crate::value::Value;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Row not found.
    #[error("{entity_type} not found: {id}")]
    RecordNotFound {
        /// Row type.
        entity_type: EntityType,
        /// Row id.
        id: RecordId,
    },

    /// Row with the same id already exists.
    #[error("Duplicate key: {entity_type} {id}")]
    DuplicateKey {
        /// Row type.
        entity_type: EntityType,
        /// Row id.
        id: RecordId,
    },

    /// Query referenced an alias that is not in scope.
    #[error("Unknown alias '{0}'")]
    UnknownAlias(String),

    /// Query referenced a parameter that was never bound.
    #[error("Unbound parameter ':{0}'")]
    UnboundParameter(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Storage trait for Identity and Variant rows.
///
/// # Safety Considerations
/// - Stored rows never carry read-time attachments
/// - Query results preserve the query's ordering and limit
pub trait RecordStore: Send + Sync {
    /// Insert a new row.
    fn insert(&self, record: Record) -> Result<(), StorageError>;

    /// Get a row by type and id.
    fn get(&self, entity_type: &EntityType, id: &RecordId) -> Result<Option<Record>, StorageError>;

    /// Replace an existing row.
    fn update(&self, record: Record) -> Result<(), StorageError>;

    /// Delete a row.
    fn delete(&self, entity_type: &EntityType, id: &RecordId) -> Result<(), StorageError>;

    /// Execute a query, returning matching root rows.
    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StorageError>;

    /// Find rows of a type whose `property` equals `value`, in insertion order.
    fn find_by(
        &self,
        entity_type: &EntityType,
        property: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StorageError>;

    /// Count rows of a type whose `property` equals `value`.
    fn count_by(
        &self,
        entity_type: &EntityType,
        property: &str,
        value: &Value,
    ) -> Result<usize, StorageError> {
        Ok(self.find_by(entity_type, property, value)?.len())
    }
}
