use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub engine: EngineConfig,
}

/// Knobs of the order conversion engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub distance_timeout: Duration,
    pub fallback_distance_km: f64,
    pub tracking_id_max_attempts: u32,
    pub qr_payments_enabled: bool,
    pub local_hold_ttl: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            distance_timeout: Duration::from_secs(10),
            fallback_distance_km: 5.0,
            tracking_id_max_attempts: 5,
            qr_payments_enabled: false,
            local_hold_ttl: chrono::Duration::hours(24),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = EngineConfig::default();

        let fallback_distance_km: f64 =
            parse_or_default("FALLBACK_DISTANCE_KM", defaults.fallback_distance_km)?;
        if !fallback_distance_km.is_finite() || fallback_distance_km < 0.0 {
            return Err(AppError::Internal(format!(
                "invalid FALLBACK_DISTANCE_KM: {fallback_distance_km}"
            )));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            engine: EngineConfig {
                distance_timeout: Duration::from_secs(parse_or_default(
                    "DISTANCE_TIMEOUT_SECS",
                    defaults.distance_timeout.as_secs(),
                )?),
                fallback_distance_km,
                tracking_id_max_attempts: parse_or_default(
                    "TRACKING_ID_MAX_ATTEMPTS",
                    defaults.tracking_id_max_attempts,
                )?
                .max(1),
                qr_payments_enabled: parse_or_default(
                    "QR_PAYMENTS_ENABLED",
                    defaults.qr_payments_enabled,
                )?,
                local_hold_ttl: chrono::Duration::seconds(parse_or_default(
                    "LOCAL_HOLD_TTL_SECS",
                    defaults.local_hold_ttl.num_seconds(),
                )?),
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
