use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One end of a delivery: who hands the parcel over or receives it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Party {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Standard,
    Document,
    Fragile,
    FoodAndDrinks,
    Overweight,
    Oversized,
}

impl PackageType {
    /// Only weight-priced parcels have to declare a weight up front.
    pub fn requires_weight(self) -> bool {
        matches!(self, PackageType::Overweight | PackageType::Oversized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageType::Standard => "standard",
            PackageType::Document => "document",
            PackageType::Fragile => "fragile",
            PackageType::FoodAndDrinks => "food_and_drinks",
            PackageType::Overweight => "overweight",
            PackageType::Oversized => "oversized",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliverySpeed {
    OnTime,
    Urgent,
    Scheduled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Qr,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Qr => "qr",
        }
    }
}

/// Account tier of the ordering customer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Regular,
    Partner,
    Vip,
}

impl CustomerTier {
    /// Only partner and VIP accounts may have the courier collect cash on delivery.
    pub fn allows_cod(self) -> bool {
        matches!(self, CustomerTier::Partner | CustomerTier::Vip)
    }
}

/// Logged-in customer placing the order, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub tier: CustomerTier,
}

/// Partner store the parcel is dispatched on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreAffiliation {
    pub store_id: String,
    pub store_name: String,
    pub sender_code: Option<String>,
}

pub const DEFAULT_WEIGHT: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDraft {
    pub sender: Party,
    pub receiver: Party,
    pub package_type: PackageType,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub delivery_speed: Option<DeliverySpeed>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cod_amount: Option<f64>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

impl OrderDraft {
    /// Weight as persisted: the declared value when present, otherwise the 1 kg default.
    pub fn effective_weight(&self) -> String {
        match self.weight.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => DEFAULT_WEIGHT.to_string(),
        }
    }
}
