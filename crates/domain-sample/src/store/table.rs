//! # In-Memory Table
//!
//! `Table<T>` owns the rows of one model. It is a cheap, cloneable handle over shared state:
//! operations, serializers and relation closures each hold a clone and see the same rows.
//!
//! The table keeps an ordered map from ids to records and a counter for id generation.
//! Reads go through [`Table::query`], which returns a deferred
//! [`MemoryQuery`] over a snapshot taken when the query executes.
//!
//! ## Operations
//!
//! * **Insert**: validates, assigns the next id, stores the record and returns it.
//! * **Get**: clones the record stored under an id, if any.
//! * **Save**: validates and replaces an existing record.
//! * **Delete**: runs the `on_delete` hook, then removes the record.

use super::{Record, StoreError};
use domain_framework::mock::{MemoryQuery, QueryStats};
use domain_framework::{Conditions, QueryError};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

struct Rows<T> {
    store: BTreeMap<u32, T>,
    next_id: u32,
}

pub struct Table<T> {
    rows: Arc<RwLock<Rows<T>>>,
    scopes: Arc<Vec<(String, Conditions)>>,
    stats: QueryStats,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            scopes: Arc::clone(&self.scopes),
            stats: self.stats.clone(),
        }
    }
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Rows {
                store: BTreeMap::new(),
                next_id: 1,
            })),
            scopes: Arc::new(Vec::new()),
            stats: QueryStats::new(),
        }
    }

    /// Registers a named scope available to every query of this table.
    pub fn with_scope(mut self, name: &str, conditions: Conditions) -> Self {
        Arc::make_mut(&mut self.scopes).push((name.to_string(), conditions));
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows<T>>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::LockPoisoned(T::MODEL))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows<T>>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::LockPoisoned(T::MODEL))
    }

    fn check(record: &T) -> Result<(), StoreError> {
        let errors = record.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Invalid {
                model: T::MODEL,
                errors,
            })
        }
    }

    /// Validates and stores a new record under the next id.
    pub fn insert(&self, mut record: T) -> Result<T, StoreError> {
        let model = T::MODEL;
        debug!(model, ?record, "Insert");
        if let Err(e) = Self::check(&record) {
            warn!(model, error = %e, "Insert failed");
            return Err(e);
        }
        let mut rows = self.write()?;
        let id = rows.next_id;
        rows.next_id += 1;
        record.assign_id(id);
        rows.store.insert(id, record.clone());
        info!(model, id, size = rows.store.len(), "Inserted");
        Ok(record)
    }

    /// Builds a record from its create payload and inserts it.
    pub fn create(&self, params: T::Create) -> Result<T, StoreError> {
        self.insert(T::from_create_params(params))
    }

    pub fn get(&self, id: u32) -> Result<Option<T>, StoreError> {
        let item = self.read()?.store.get(&id).cloned();
        debug!(model = T::MODEL, id, found = item.is_some(), "Get");
        Ok(item)
    }

    /// Replaces a stored record with a modified copy.
    pub fn save(&self, record: T) -> Result<T, StoreError> {
        let model = T::MODEL;
        let id = record.id().ok_or(StoreError::NotPersisted(model))?;
        debug!(model, id, ?record, "Save");
        if let Err(e) = Self::check(&record) {
            warn!(model, id, error = %e, "Save failed");
            return Err(e);
        }
        let mut rows = self.write()?;
        match rows.store.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                info!(model, id, "Saved");
                Ok(record)
            }
            None => {
                warn!(model, id, "Not found");
                Err(StoreError::NotFound { model, id })
            }
        }
    }

    /// Applies an update payload to a stored record and saves it.
    pub fn update(&self, id: u32, update: T::Update) -> Result<T, StoreError> {
        let mut record = self
            .get(id)?
            .ok_or(StoreError::NotFound { model: T::MODEL, id })?;
        record.on_update(update);
        self.save(record)
    }

    pub fn delete(&self, id: u32) -> Result<T, StoreError> {
        let model = T::MODEL;
        debug!(model, id, "Delete");
        let mut rows = self.write()?;
        let Some(record) = rows.store.get(&id) else {
            warn!(model, id, "Not found");
            return Err(StoreError::NotFound { model, id });
        };
        if let Err(e) = record.on_delete() {
            warn!(model, id, error = %e, "on_delete failed");
            return Err(e);
        }
        let removed = rows.store.remove(&id).ok_or(StoreError::NotFound { model, id })?;
        info!(model, id, size = rows.store.len(), "Deleted");
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.store.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Execution counter shared by every query of this table.
    pub fn stats(&self) -> QueryStats {
        self.stats.clone()
    }

    /// A deferred query over all rows, in id order.
    pub fn query(&self) -> MemoryQuery<T> {
        let rows = Arc::clone(&self.rows);
        let query = MemoryQuery::from_source(T::TABLE, move || {
            let rows = rows
                .read()
                .map_err(|_| QueryError::Storage(format!("{} table lock poisoned", T::MODEL)))?;
            Ok(rows.store.values().cloned().collect())
        })
        .with_stats(self.stats.clone());
        self.scopes
            .iter()
            .fold(query, |query, (name, conditions)| {
                query.with_scope(name, conditions.clone())
            })
    }
}
