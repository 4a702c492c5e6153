//! Persistence collaborators.
//!
//! The durable store is reached through [`Table`], one instance per table. Rows cross the
//! boundary as JSON objects; which optional columns a table accepts is negotiated once through
//! [`schema::negotiate`] rather than discovered from failed writes.

pub mod memory;
pub mod pending;
pub mod schema;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The table has no column for these fields.
    #[error("schema mismatch on fields: {}", fields.join(", "))]
    SchemaMismatch { fields: Vec<String> },

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("row could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Table: Send + Sync {
    /// Column names the table currently accepts.
    async fn columns(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Inserts a new row. Existing keys are reported as [`StoreError::DuplicateKey`].
    async fn insert(&self, key: &str, row: Row) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Row>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Source of raw `pricing.*` settings.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<(String, String)>, StoreError>;
}
