use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::tracking::TrackingId;
use crate::models::order::{DeliverySpeed, PackageType, PaymentMethod};
use crate::models::pending::{null_as_zero, PendingOrder};

pub const UNASSIGNED_COURIER: &str = "unassigned";
pub const CURRENCY_SUFFIX: &str = "MMK";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    AwaitingCollectionPayment,
    AwaitingPickup,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl PackageStatus {
    pub fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => PackageStatus::AwaitingCollectionPayment,
            PaymentMethod::Qr => PackageStatus::AwaitingPickup,
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PackageStatus::AwaitingCollectionPayment => "awaiting collection payment",
            PackageStatus::AwaitingPickup => "awaiting pickup",
            PackageStatus::PickedUp => "picked up",
            PackageStatus::InTransit => "in transit",
            PackageStatus::Delivered => "delivered",
            PackageStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Committed parcel, keyed by tracking id. Downstream dispatch owns it after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageRecord {
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
    pub delivery_distance: f64,
    pub price: String,
    pub payment_method: PaymentMethod,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub cod_amount: f64,
    pub status: PackageStatus,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub pickup_time: String,
    #[serde(default)]
    pub delivery_time: String,
    pub courier: String,
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

impl PackageRecord {
    pub fn from_pending(
        pending: &PendingOrder,
        method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tracking_id: pending.tracking_id.clone(),
            sender_name: pending.sender_name.clone(),
            sender_phone: pending.sender_phone.clone(),
            sender_address: pending.sender_address.clone(),
            sender_latitude: pending.sender_latitude,
            sender_longitude: pending.sender_longitude,
            receiver_name: pending.receiver_name.clone(),
            receiver_phone: pending.receiver_phone.clone(),
            receiver_address: pending.receiver_address.clone(),
            receiver_latitude: pending.receiver_latitude,
            receiver_longitude: pending.receiver_longitude,
            package_type: pending.package_type,
            weight: pending.weight.clone(),
            delivery_speed: pending.delivery_speed,
            scheduled_delivery_time: pending.scheduled_delivery_time,
            delivery_distance: pending.distance,
            price: format_price(pending.price),
            payment_method: method,
            cod_amount: pending.cod_amount,
            status: PackageStatus::initial_for(method),
            create_time: created_at,
            pickup_time: String::new(),
            delivery_time: String::new(),
            courier: UNASSIGNED_COURIER.to_string(),
            customer_email: pending.customer_email.clone(),
            customer_name: pending.customer_name.clone(),
            customer_id: pending.customer_id.clone(),
            delivery_store_id: pending.delivery_store_id.clone(),
            delivery_store_name: pending.delivery_store_name.clone(),
            sender_code: pending.sender_code.clone(),
        }
    }

    /// Whether this package was committed from `pending`, as opposed to an unrelated order that
    /// happens to share its tracking id.
    pub fn committed_from(&self, pending: &PendingOrder) -> bool {
        self.tracking_id == pending.tracking_id
            && self.sender_name == pending.sender_name
            && self.sender_phone == pending.sender_phone
            && self.sender_address == pending.sender_address
            && self.receiver_name == pending.receiver_name
            && self.receiver_phone == pending.receiver_phone
            && self.receiver_address == pending.receiver_address
            && self.package_type == pending.package_type
            && self.weight == pending.weight
            && self.price == format_price(pending.price)
    }
}

pub fn format_price(price: u64) -> String {
    format!("{price} {CURRENCY_SUFFIX}")
}
