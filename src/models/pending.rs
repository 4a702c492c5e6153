use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::tracking::TrackingId;
use crate::models::order::{DeliverySpeed, PackageType, PaymentMethod};

/// Snapshot of a quoted order waiting for payment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOrder {
    #[serde(rename = "id")]
    pub tracking_id: TrackingId,
    pub sender_name: String,
    pub sender_phone: String,
    pub sender_address: String,
    #[serde(default)]
    pub sender_latitude: Option<f64>,
    #[serde(default)]
    pub sender_longitude: Option<f64>,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    #[serde(default)]
    pub receiver_latitude: Option<f64>,
    #[serde(default)]
    pub receiver_longitude: Option<f64>,
    pub package_type: PackageType,
    pub weight: String,
    #[serde(default)]
    pub delivery_speed: Option<DeliverySpeed>,
    #[serde(default)]
    pub scheduled_delivery_time: Option<DateTime<Utc>>,
    pub price: u64,
    pub distance: f64,
    pub payment_method: PaymentMethod,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub cod_amount: f64,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub delivery_store_id: Option<String>,
    #[serde(default)]
    pub delivery_store_name: Option<String>,
    #[serde(default)]
    pub sender_code: Option<String>,
}

pub(crate) fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}
