use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::conversion::TrackedOrder;
use crate::engine::tracking::TrackingId;
use crate::error::AppError;
use crate::models::order::PaymentMethod;
use crate::models::package::PackageRecord;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:tracking_id", get(get_order))
        .route("/orders/:tracking_id/commit", post(commit_order))
}

#[derive(Deserialize)]
pub struct CommitRequest {
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

fn parse_tracking_id(raw: &str) -> Result<TrackingId, AppError> {
    TrackingId::parse(raw).map_err(|err| AppError::BadRequest(err.to_string()))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<TrackedOrder>, AppError> {
    let tracking_id = parse_tracking_id(&tracking_id)?;

    state
        .service
        .lookup(&tracking_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {tracking_id} not found")))
}

async fn commit_order(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    Json(payload): Json<CommitRequest>,
) -> Result<Json<PackageRecord>, AppError> {
    let tracking_id = parse_tracking_id(&tracking_id)?;
    let record = state
        .service
        .commit(&tracking_id, payload.payment_method)
        .await?;
    Ok(Json(record))
}
