use serde::{Deserialize, Serialize};

pub const SETTINGS_PREFIX: &str = "pricing.";

/// Pricing snapshot frozen into a quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricingSettings {
    pub base_fee: f64,
    pub per_km_fee: f64,
    pub free_km_threshold: f64,
    /// Per kg above the 5 kg allowance.
    pub weight_surcharge: f64,
    /// Per km.
    pub oversize_surcharge: f64,
    /// Per km.
    pub fragile_surcharge: f64,
    /// Per km.
    pub food_beverage_surcharge: f64,
    pub urgent_surcharge: f64,
    pub scheduled_surcharge: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            base_fee: 1500.0,
            per_km_fee: 500.0,
            free_km_threshold: 3.0,
            weight_surcharge: 150.0,
            oversize_surcharge: 300.0,
            fragile_surcharge: 200.0,
            food_beverage_surcharge: 300.0,
            urgent_surcharge: 500.0,
            scheduled_surcharge: 200.0,
        }
    }
}

impl PricingSettings {
    /// Builds settings from raw `pricing.*` entries. Keys that are missing or do not hold a
    /// number keep their default; unknown keys are ignored.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();

        for (key, value) in entries {
            let key = key.as_ref();
            let name = key.strip_prefix(SETTINGS_PREFIX).unwrap_or(key);
            let Some(value) = parse_setting_value(value.as_ref()) else {
                continue;
            };

            let slot = match name {
                "base_fee" => &mut settings.base_fee,
                "per_km_fee" => &mut settings.per_km_fee,
                "free_km_threshold" => &mut settings.free_km_threshold,
                "weight_surcharge" => &mut settings.weight_surcharge,
                "oversize_surcharge" => &mut settings.oversize_surcharge,
                "fragile_surcharge" => &mut settings.fragile_surcharge,
                "food_beverage_surcharge" => &mut settings.food_beverage_surcharge,
                "urgent_surcharge" => &mut settings.urgent_surcharge,
                "scheduled_surcharge" => &mut settings.scheduled_surcharge,
                _ => continue,
            };
            *slot = value;
        }

        settings
    }
}

// Values arrive either bare ("1500") or JSON-encoded ("\"1500\"").
fn parse_setting_value(raw: &str) -> Option<f64> {
    let parsed = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(serde_json::Value::Number(n)) => n.as_f64(),
        Ok(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => raw.trim().parse::<f64>().ok(),
    };

    parsed.filter(|v| v.is_finite() && *v >= 0.0)
}
