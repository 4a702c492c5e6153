use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::{Row, StoreError, Table};

/// Optional columns that may lag behind the engine's field set.
const EXTENSION_FIELDS: &[&str] = &[
    "cod_amount",
    "customer_email",
    "customer_name",
    "customer_id",
    "delivery_store_id",
    "delivery_store_name",
    "sender_code",
];

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub version: u32,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl TableSchema {
    pub fn is_required(&self, field: &str) -> bool {
        self.required.contains(&field)
    }

    pub fn is_optional(&self, field: &str) -> bool {
        self.optional.contains(&field)
    }
}

pub static PENDING_ORDERS: TableSchema = TableSchema {
    name: "pending_orders",
    version: 2,
    required: &[
        "id",
        "sender_name",
        "sender_phone",
        "sender_address",
        "sender_latitude",
        "sender_longitude",
        "receiver_name",
        "receiver_phone",
        "receiver_address",
        "receiver_latitude",
        "receiver_longitude",
        "package_type",
        "weight",
        "delivery_speed",
        "scheduled_delivery_time",
        "price",
        "distance",
        "payment_method",
    ],
    optional: EXTENSION_FIELDS,
};

pub static PACKAGES: TableSchema = TableSchema {
    name: "packages",
    version: 2,
    required: &[
        "id",
        "sender_name",
        "sender_phone",
        "sender_address",
        "sender_latitude",
        "sender_longitude",
        "receiver_name",
        "receiver_phone",
        "receiver_address",
        "receiver_latitude",
        "receiver_longitude",
        "package_type",
        "weight",
        "delivery_speed",
        "scheduled_delivery_time",
        "delivery_distance",
        "price",
        "payment_method",
        "status",
        "create_time",
        "pickup_time",
        "delivery_time",
        "courier",
    ],
    optional: EXTENSION_FIELDS,
};

/// Optional columns a table was found to support at startup.
#[derive(Debug, Clone)]
pub struct Capabilities {
    schema: &'static TableSchema,
    supported: BTreeSet<&'static str>,
}

impl Capabilities {
    /// Assumes every optional column exists.
    pub fn all(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            supported: schema.optional.iter().copied().collect(),
        }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub fn supports(&self, field: &str) -> bool {
        self.supported.contains(field)
    }

    /// Drops optional fields the table does not carry.
    pub fn project(&self, mut row: Row) -> Row {
        row.retain(|field, _| !self.schema.is_optional(field) || self.supports(field));
        row
    }

    /// Payload for the single retry after a schema mismatch: no optional fields, and nothing
    /// the store complained about unless the schema requires it.
    pub fn strip_for_retry(&self, mut row: Row, reported: &[String]) -> Row {
        row.retain(|field, _| {
            if self.schema.is_optional(field) {
                return false;
            }
            self.schema.is_required(field) || !reported.iter().any(|r| r == field)
        });
        row
    }
}

/// Queries the table's columns once. An unreachable store is assumed to be fully up to date;
/// the write-time strip-and-retry still covers it.
pub async fn negotiate(table: &dyn Table, schema: &'static TableSchema) -> Capabilities {
    match table.columns().await {
        Ok(columns) => {
            let missing_required: Vec<&str> = schema
                .required
                .iter()
                .copied()
                .filter(|field| !columns.contains(*field))
                .collect();
            if !missing_required.is_empty() {
                warn!(
                    table = schema.name,
                    version = schema.version,
                    missing = ?missing_required,
                    "table lacks required columns"
                );
            }

            let supported: BTreeSet<&'static str> = schema
                .optional
                .iter()
                .copied()
                .filter(|field| columns.contains(*field))
                .collect();

            debug!(
                table = schema.name,
                version = schema.version,
                supported = ?supported,
                "negotiated optional columns"
            );

            Capabilities { schema, supported }
        }
        Err(err) => {
            warn!(
                table = schema.name,
                error = %err,
                "column discovery failed; assuming all optional columns"
            );
            Capabilities::all(schema)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// Written with every supported field.
    Full,
    /// Written after dropping optional fields the store rejected.
    Stripped,
}

/// Inserts `row`, retrying once without optional fields if the store reports a schema
/// mismatch. A second mismatch is returned to the caller. On success, returns the row as it
/// was actually written.
pub async fn insert_with_schema_retry(
    table: &dyn Table,
    caps: &Capabilities,
    key: &str,
    row: Row,
) -> Result<(WritePath, Row), StoreError> {
    let row = caps.project(row);

    match table.insert(key, row.clone()).await {
        Ok(()) => Ok((WritePath::Full, row)),
        Err(StoreError::SchemaMismatch { fields }) => {
            warn!(
                table = caps.schema.name,
                key,
                fields = ?fields,
                "schema mismatch; retrying without optional fields"
            );
            let stripped = caps.strip_for_retry(row, &fields);
            table.insert(key, stripped.clone()).await?;
            Ok((WritePath::Stripped, stripped))
        }
        Err(err) => Err(err),
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(row)) => Ok(row),
        Ok(other) => Err(StoreError::Decode(format!("expected object, got {other}"))),
        Err(err) => Err(StoreError::Decode(err.to_string())),
    }
}

pub fn decode<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|err| StoreError::Decode(err.to_string()))
}
