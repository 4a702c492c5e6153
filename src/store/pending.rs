use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::tracking::TrackingId;
use crate::models::pending::PendingOrder;
use crate::store::schema::{self, Capabilities, WritePath, PENDING_ORDERS};
use crate::store::{StoreError, Table};

/// Where a pending hold ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPath {
    Durable,
    Stripped,
    Local,
}

impl HoldPath {
    pub fn as_str(self) -> &'static str {
        match self {
            HoldPath::Durable => "durable",
            HoldPath::Stripped => "stripped",
            HoldPath::Local => "local",
        }
    }
}

#[derive(Debug, Clone)]
struct LocalHold {
    order: PendingOrder,
    held_at: DateTime<Utc>,
}

/// Pending holds keyed by tracking id: the durable table first, a local cache when the table
/// cannot take the row.
pub struct PendingOrderStore {
    table: Arc<dyn Table>,
    capabilities: Capabilities,
    local: DashMap<TrackingId, LocalHold>,
    local_ttl: Duration,
}

impl PendingOrderStore {
    pub fn new(table: Arc<dyn Table>, capabilities: Capabilities, local_ttl: Duration) -> Self {
        Self {
            table,
            capabilities,
            local: DashMap::new(),
            local_ttl,
        }
    }

    /// Negotiates the table's optional columns before use.
    pub async fn connect(table: Arc<dyn Table>, local_ttl: Duration) -> Self {
        let capabilities = schema::negotiate(table.as_ref(), &PENDING_ORDERS).await;
        Self::new(table, capabilities, local_ttl)
    }

    pub async fn create(&self, order: &PendingOrder) -> Result<HoldPath, StoreError> {
        let key = order.tracking_id.as_str();
        if self.local.contains_key(&order.tracking_id) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }

        let row = schema::encode(order)?;
        match schema::insert_with_schema_retry(self.table.as_ref(), &self.capabilities, key, row)
            .await
        {
            Ok((WritePath::Full, _)) => Ok(HoldPath::Durable),
            Ok((WritePath::Stripped, _)) => Ok(HoldPath::Stripped),
            Err(StoreError::SchemaMismatch { fields }) => {
                // A drifted table can report the mismatch ahead of a key conflict.
                if self.table.get(key).await?.is_some() {
                    return Err(StoreError::DuplicateKey(key.to_string()));
                }
                warn!(
                    tracking_id = %order.tracking_id,
                    fields = ?fields,
                    "durable hold rejected after retry; keeping order in local cache"
                );
                self.hold_locally(order.clone(), Utc::now());
                Ok(HoldPath::Local)
            }
            Err(err) => Err(err),
        }
    }

    /// Durable copy first, local cache second.
    pub async fn get(&self, id: &TrackingId) -> Result<Option<PendingOrder>, StoreError> {
        let durable_err = match self.table.get(id.as_str()).await {
            Ok(Some(row)) => return schema::decode(row).map(Some),
            Ok(None) => None,
            Err(err) => {
                warn!(tracking_id = %id, error = %err, "durable read failed; checking local cache");
                Some(err)
            }
        };

        match (self.local_copy(id, Utc::now()), durable_err) {
            (Some(order), _) => Ok(Some(order)),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(None),
        }
    }

    /// Removes both copies. The local copy always goes; a durable failure is returned.
    pub async fn delete(&self, id: &TrackingId) -> Result<(), StoreError> {
        if self.local.remove(id).is_some() {
            debug!(tracking_id = %id, "local hold removed");
        }
        self.table.delete(id.as_str()).await
    }

    pub fn is_held_locally(&self, id: &TrackingId) -> bool {
        self.local.contains_key(id)
    }

    /// Drops local holds older than the configured TTL. Returns how many were dropped.
    pub fn purge_expired_local(&self, now: DateTime<Utc>) -> usize {
        let before = self.local.len();
        self.local
            .retain(|_, hold| now.signed_duration_since(hold.held_at) < self.local_ttl);
        let purged = before.saturating_sub(self.local.len());
        if purged > 0 {
            info!(purged, "expired local holds purged");
        }
        purged
    }

    fn hold_locally(&self, order: PendingOrder, held_at: DateTime<Utc>) {
        self.local
            .insert(order.tracking_id.clone(), LocalHold { order, held_at });
    }

    fn local_copy(&self, id: &TrackingId, now: DateTime<Utc>) -> Option<PendingOrder> {
        self.local
            .get(id)
            .filter(|hold| now.signed_duration_since(hold.held_at) < self.local_ttl)
            .map(|hold| hold.order.clone())
    }
}
