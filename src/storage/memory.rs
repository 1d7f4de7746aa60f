//! In-memory storage backend.
//!
//! Rows are kept per type in insertion order. Queries run through the
//! evaluator in [`super::eval`].

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::trace;

use crate::query::Query;
use crate::record::{EntityType, Record, RecordId};
use crate::value::Value;

use super::eval::{self, RowSource};
use super::{RecordStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("lock poisoned: {context}"))
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<u64, Record>,
    index: HashMap<RecordId, u64>,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<EntityType, Table>,
    next_seq: u64,
}

impl RowSource for StoreState {
    fn scan(&self, entity_type: &EntityType) -> Vec<&Record> {
        self.tables
            .get(entity_type)
            .map(|table| table.rows.values().collect())
            .unwrap_or_default()
    }
}

/// In-memory implementation of [`RecordStore`].
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for a type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the store lock is poisoned.
    pub fn len(&self, entity_type: &EntityType) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.len"))?;
        Ok(state.tables.get(entity_type).map_or(0, |t| t.rows.len()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: Record) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.insert"))?;
        let seq = state.next_seq;
        let table = state.tables.entry(record.entity_type.clone()).or_default();
        if table.index.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                entity_type: record.entity_type,
                id: record.id,
            });
        }
        table.index.insert(record.id.clone(), seq);
        table.rows.insert(seq, record.detached());
        state.next_seq += 1;
        Ok(())
    }

    fn get(&self, entity_type: &EntityType, id: &RecordId) -> Result<Option<Record>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.get"))?;
        Ok(state.tables.get(entity_type).and_then(|table| {
            table
                .index
                .get(id)
                .and_then(|seq| table.rows.get(seq))
                .cloned()
        }))
    }

    fn update(&self, record: Record) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.update"))?;
        let slot = state
            .tables
            .get_mut(&record.entity_type)
            .and_then(|table| {
                let seq = table.index.get(&record.id).copied()?;
                table.rows.get_mut(&seq)
            })
            .ok_or_else(|| StorageError::RecordNotFound {
                entity_type: record.entity_type.clone(),
                id: record.id.clone(),
            })?;
        *slot = record.detached();
        Ok(())
    }

    fn delete(&self, entity_type: &EntityType, id: &RecordId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.delete"))?;
        let removed = state.tables.get_mut(entity_type).and_then(|table| {
            let seq = table.index.remove(id)?;
            table.rows.remove(&seq)
        });
        if removed.is_none() {
            return Err(StorageError::RecordNotFound {
                entity_type: entity_type.clone(),
                id: id.clone(),
            });
        }
        Ok(())
    }

    fn fetch(&self, query: &Query) -> Result<Vec<Record>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.fetch"))?;
        let rows = eval::execute(&*state, query)?;
        trace!(query = %query, rows = rows.len(), "fetched");
        Ok(rows)
    }

    fn find_by(
        &self,
        entity_type: &EntityType,
        property: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.find_by"))?;
        Ok(state
            .scan(entity_type)
            .into_iter()
            .filter(|record| &record.value(property) == value)
            .cloned()
            .collect())
    }
}
