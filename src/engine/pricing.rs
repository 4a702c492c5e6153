use crate::models::order::{DeliverySpeed, PackageType};
use crate::models::settings::PricingSettings;

const WEIGHT_ALLOWANCE_KG: f64 = 5.0;
const DEFAULT_WEIGHT_KG: f64 = 1.0;
const PRICE_STEP: f64 = 100.0;

/// Callers round the resolved distance up to whole kilometers before pricing.
pub fn round_distance_km(raw_km: f64) -> f64 {
    if raw_km.is_finite() && raw_km > 0.0 {
        raw_km.ceil()
    } else {
        0.0
    }
}

pub fn parse_weight_kg(weight: Option<&str>) -> f64 {
    weight
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|kg| kg.is_finite() && *kg > 0.0)
        .unwrap_or(DEFAULT_WEIGHT_KG)
}

/// Delivery fee in whole currency units, always a multiple of 100.
pub fn price(
    package_type: PackageType,
    weight: Option<&str>,
    delivery_speed: Option<DeliverySpeed>,
    distance_km: f64,
    settings: &PricingSettings,
) -> u64 {
    let distance_km = distance_km.max(0.0);

    let total = settings.base_fee
        + distance_fee(distance_km, settings)
        + weight_fee(parse_weight_kg(weight), settings)
        + package_fee(package_type, distance_km, settings)
        + speed_fee(delivery_speed, settings);

    round_up_to_step(total)
}

fn distance_fee(distance_km: f64, settings: &PricingSettings) -> f64 {
    if distance_km > settings.free_km_threshold {
        (distance_km - settings.free_km_threshold) * settings.per_km_fee
    } else {
        0.0
    }
}

fn weight_fee(weight_kg: f64, settings: &PricingSettings) -> f64 {
    if weight_kg > WEIGHT_ALLOWANCE_KG {
        (weight_kg - WEIGHT_ALLOWANCE_KG) * settings.weight_surcharge
    } else {
        0.0
    }
}

fn package_fee(package_type: PackageType, distance_km: f64, settings: &PricingSettings) -> f64 {
    match package_type {
        PackageType::Oversized => distance_km * settings.oversize_surcharge,
        PackageType::Fragile => distance_km * settings.fragile_surcharge,
        PackageType::FoodAndDrinks => distance_km * settings.food_beverage_surcharge,
        PackageType::Standard | PackageType::Document | PackageType::Overweight => 0.0,
    }
}

fn speed_fee(delivery_speed: Option<DeliverySpeed>, settings: &PricingSettings) -> f64 {
    match delivery_speed {
        Some(DeliverySpeed::Urgent) => settings.urgent_surcharge,
        Some(DeliverySpeed::Scheduled) => settings.scheduled_surcharge,
        Some(DeliverySpeed::OnTime) | None => 0.0,
    }
}

fn round_up_to_step(total: f64) -> u64 {
    let steps = (total / PRICE_STEP).ceil().max(0.0);
    (steps * PRICE_STEP) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PricingSettings {
        PricingSettings {
            base_fee: 1500.0,
            per_km_fee: 500.0,
            free_km_threshold: 3.0,
            ..PricingSettings::default()
        }
    }

    #[test]
    fn standard_on_time_order_in_mandalay() {
        let distance = round_distance_km(6.1);
        assert_eq!(distance, 7.0);

        let total = price(
            PackageType::Standard,
            None,
            Some(DeliverySpeed::OnTime),
            distance,
            &settings(),
        );
        assert_eq!(total, 3500);
    }

    #[test]
    fn distance_inside_free_threshold_costs_base_fee_only() {
        let total = price(PackageType::Document, None, None, 2.0, &settings());
        assert_eq!(total, 1500);
    }

    #[test]
    fn surcharges_stack_and_round_up() {
        let settings = PricingSettings {
            base_fee: 1000.0,
            per_km_fee: 500.0,
            free_km_threshold: 3.0,
            weight_surcharge: 150.0,
            oversize_surcharge: 300.0,
            fragile_surcharge: 400.0,
            food_beverage_surcharge: 300.0,
            urgent_surcharge: 1500.0,
            scheduled_surcharge: 500.0,
        };

        // 1000 + (4-3)*500 + (7.5-5)*150 + 4*300 + 1500 = 4575 -> 4600
        let total = price(
            PackageType::Oversized,
            Some("7.5"),
            Some(DeliverySpeed::Urgent),
            4.0,
            &settings,
        );
        assert_eq!(total, 4600);
    }

    #[test]
    fn unparsable_weight_means_no_weight_surcharge() {
        let with_garbage = price(PackageType::Standard, Some("heavy"), None, 5.0, &settings());
        let without = price(PackageType::Standard, None, None, 5.0, &settings());
        assert_eq!(with_garbage, without);
    }

    #[test]
    fn price_is_monotonic_in_distance_and_always_a_multiple_of_100() {
        let settings = PricingSettings::default();
        let types = [
            PackageType::Standard,
            PackageType::Fragile,
            PackageType::FoodAndDrinks,
            PackageType::Oversized,
        ];

        for package_type in types {
            let mut previous = 0;
            for km in 0..60 {
                let total = price(
                    package_type,
                    Some("12"),
                    Some(DeliverySpeed::Scheduled),
                    km as f64,
                    &settings,
                );
                assert_eq!(total % 100, 0);
                assert!(total >= previous, "{package_type:?} at {km} km");
                previous = total;
            }
        }
    }

    #[test]
    fn any_fraction_above_a_step_rounds_up() {
        assert_eq!(round_up_to_step(3500.0), 3500);
        assert_eq!(round_up_to_step(100.000001), 200);

        let settings = PricingSettings {
            base_fee: 1500.0,
            per_km_fee: 0.25,
            free_km_threshold: 0.0,
            ..PricingSettings::default()
        };
        // 1500 + 2 * 0.25 = 1500.5
        assert_eq!(price(PackageType::Standard, None, None, 2.0, &settings), 1600);
    }

    #[test]
    fn non_positive_raw_distance_rounds_to_zero() {
        assert_eq!(round_distance_km(0.0), 0.0);
        assert_eq!(round_distance_km(-3.2), 0.0);
        assert_eq!(round_distance_km(f64::NAN), 0.0);
        assert_eq!(round_distance_km(7.0), 7.0);
    }
}
