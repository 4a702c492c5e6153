//! In-process collaborators backing the HTTP binary and the tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::store::schema::TableSchema;
use crate::store::{Row, SettingsSource, StoreError, Table};

/// Table with a mutable column set, so schema drift can be reproduced.
#[derive(Default)]
pub struct MemoryTable {
    rows: DashMap<String, Row>,
    columns: DashSet<String>,
    offline: AtomicBool,
    scripted_insert_errors: Mutex<VecDeque<StoreError>>,
    insert_attempts: AtomicUsize,
}

impl MemoryTable {
    pub fn new<I>(columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let table = Self::default();
        for column in columns {
            table.columns.insert(column.to_string());
        }
        table
    }

    pub fn with_full_schema(schema: &TableSchema) -> Self {
        Self::new(schema.required.iter().chain(schema.optional.iter()))
    }

    pub fn with_required_only(schema: &TableSchema) -> Self {
        Self::new(schema.required.iter())
    }

    pub fn drop_column(&self, column: &str) {
        self.columns.remove(column);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Queues an error returned by the next insert, ahead of normal processing.
    pub fn fail_next_insert(&self, err: StoreError) {
        if let Ok(mut queue) = self.scripted_insert_errors.lock() {
            queue.push_back(err);
        }
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory table offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn next_scripted_error(&self) -> Option<StoreError> {
        self.scripted_insert_errors
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
    }
}

#[async_trait]
impl Table for MemoryTable {
    async fn columns(&self) -> Result<BTreeSet<String>, StoreError> {
        self.ensure_online()?;
        Ok(self.columns.iter().map(|c| c.key().clone()).collect())
    }

    async fn insert(&self, key: &str, row: Row) -> Result<(), StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        if let Some(err) = self.next_scripted_error() {
            return Err(err);
        }

        let mut unknown: Vec<String> = row
            .keys()
            .filter(|field| !self.columns.contains(field.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(StoreError::SchemaMismatch { fields: unknown });
        }

        match self.rows.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::DuplicateKey(key.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Row>, StoreError> {
        self.ensure_online()?;
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.rows.remove(key);
        Ok(())
    }
}

/// Fixed pricing settings, optionally unreachable.
#[derive(Default)]
pub struct StaticSettings {
    entries: Vec<(String, String)>,
    offline: AtomicBool,
}

impl StaticSettings {
    pub fn new<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn fetch(&self) -> Result<Vec<(String, String)>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("settings offline".to_string()));
        }
        Ok(self.entries.clone())
    }
}
