use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::pricing::round_distance_km;
use crate::geo::road_estimate_km;
use crate::models::order::{GeoPoint, OrderDraft};

pub const DEFAULT_ROAD_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum DistanceError {
    #[error("distance provider unavailable: {0}")]
    Unavailable(String),

    #[error("no route between the two addresses")]
    NoRoute,

    #[error("distance provider quota exceeded")]
    QuotaExceeded,

    #[error("distance resolution timed out")]
    Timeout,
}

impl DistanceError {
    pub fn code(&self) -> &'static str {
        match self {
            DistanceError::Unavailable(_) => "unavailable",
            DistanceError::NoRoute => "no_route",
            DistanceError::QuotaExceeded => "quota_exceeded",
            DistanceError::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRequest {
    pub origin_address: String,
    pub destination_address: String,
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
}

impl DistanceRequest {
    pub fn for_draft(draft: &OrderDraft) -> Self {
        Self {
            origin_address: draft.sender.address.clone(),
            destination_address: draft.receiver.address.clone(),
            origin: draft.sender.location,
            destination: draft.receiver.location,
        }
    }
}

/// Mapping provider seam: travel distance in kilometers between two addresses.
#[async_trait]
pub trait DistanceResolver: Send + Sync {
    async fn resolve(&self, request: &DistanceRequest) -> Result<f64, DistanceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDistance {
    pub raw_km: f64,
    pub rounded_km: f64,
    /// Set when the fallback distance was substituted.
    pub advisory: Option<DistanceError>,
}

impl ResolvedDistance {
    pub fn is_fallback(&self) -> bool {
        self.advisory.is_some()
    }
}

/// Resolves a distance, substituting `fallback_km` on any provider failure or timeout.
pub async fn resolve_with_fallback(
    resolver: &dyn DistanceResolver,
    request: &DistanceRequest,
    timeout: Duration,
    fallback_km: f64,
) -> ResolvedDistance {
    let outcome = match tokio::time::timeout(timeout, resolver.resolve(request)).await {
        Ok(Ok(km)) if km.is_finite() && km >= 0.0 => Ok(km),
        Ok(Ok(km)) => Err(DistanceError::Unavailable(format!(
            "provider returned invalid distance {km}"
        ))),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DistanceError::Timeout),
    };

    match outcome {
        Ok(raw_km) => {
            debug!(raw_km, "distance resolved");
            ResolvedDistance {
                raw_km,
                rounded_km: round_distance_km(raw_km),
                advisory: None,
            }
        }
        Err(err) => {
            warn!(
                error = %err,
                code = err.code(),
                fallback_km,
                "distance resolution failed; using fallback distance"
            );
            ResolvedDistance {
                raw_km: fallback_km,
                rounded_km: round_distance_km(fallback_km),
                advisory: Some(err),
            }
        }
    }
}

/// Estimates road distance from the pinned coordinates of both parties.
#[derive(Debug, Clone)]
pub struct CoordinateResolver {
    road_factor: f64,
}

impl CoordinateResolver {
    pub fn new(road_factor: f64) -> Self {
        Self { road_factor }
    }
}

impl Default for CoordinateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ROAD_FACTOR)
    }
}

#[async_trait]
impl DistanceResolver for CoordinateResolver {
    async fn resolve(&self, request: &DistanceRequest) -> Result<f64, DistanceError> {
        match (&request.origin, &request.destination) {
            (Some(origin), Some(destination)) => {
                Ok(road_estimate_km(origin, destination, self.road_factor))
            }
            _ => Err(DistanceError::NoRoute),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<f64, DistanceError>);

    #[async_trait]
    impl DistanceResolver for Fixed {
        async fn resolve(&self, _request: &DistanceRequest) -> Result<f64, DistanceError> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl DistanceResolver for Stalled {
        async fn resolve(&self, _request: &DistanceRequest) -> Result<f64, DistanceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1.0)
        }
    }

    fn request() -> DistanceRequest {
        DistanceRequest {
            origin_address: "No.1, 72nd St, Mandalay".to_string(),
            destination_address: "32nd St, Mandalay".to_string(),
            origin: None,
            destination: None,
        }
    }

    #[tokio::test]
    async fn provider_distance_is_rounded_up() {
        let resolved =
            resolve_with_fallback(&Fixed(Ok(6.1)), &request(), Duration::from_secs(10), 5.0).await;

        assert_eq!(resolved.raw_km, 6.1);
        assert_eq!(resolved.rounded_km, 7.0);
        assert!(!resolved.is_fallback());
    }

    #[tokio::test]
    async fn provider_errors_fall_back_to_default_distance() {
        for err in [
            DistanceError::Unavailable("offline".to_string()),
            DistanceError::NoRoute,
            DistanceError::QuotaExceeded,
        ] {
            let resolved = resolve_with_fallback(
                &Fixed(Err(err.clone())),
                &request(),
                Duration::from_secs(10),
                5.0,
            )
            .await;

            assert_eq!(resolved.rounded_km, 5.0);
            assert_eq!(resolved.advisory, Some(err));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let resolved =
            resolve_with_fallback(&Stalled, &request(), Duration::from_secs(10), 5.0).await;

        assert_eq!(resolved.rounded_km, 5.0);
        assert_eq!(resolved.advisory, Some(DistanceError::Timeout));
        assert_eq!(resolved.advisory.map(|e| e.code()), Some("timeout"));
    }

    #[tokio::test]
    async fn negative_provider_distance_is_treated_as_unavailable() {
        let resolved =
            resolve_with_fallback(&Fixed(Ok(-2.0)), &request(), Duration::from_secs(10), 5.0)
                .await;

        assert!(matches!(resolved.advisory, Some(DistanceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn coordinate_resolver_needs_both_points() {
        let resolver = CoordinateResolver::default();
        assert_eq!(
            resolver.resolve(&request()).await,
            Err(DistanceError::NoRoute)
        );

        let mut pinned = request();
        pinned.origin = Some(GeoPoint {
            lat: 21.9750,
            lng: 96.0836,
        });
        pinned.destination = Some(GeoPoint {
            lat: 21.9588,
            lng: 96.0891,
        });
        let km = resolver.resolve(&pinned).await.unwrap();
        assert!(km > 1.0 && km < 5.0);
    }

    #[test]
    fn advisory_serializes_with_stable_code() {
        let value = serde_json::to_value(DistanceError::QuotaExceeded).unwrap();
        assert_eq!(value["code"], "quota_exceeded");
    }
}
