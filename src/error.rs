use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::session::OrderState;
use crate::engine::tracking::TrackingId;
use crate::models::order::{PackageType, PaymentMethod};
use crate::store::StoreError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("sender address is required")]
    MissingSenderAddress,

    #[error("receiver address is required")]
    MissingReceiverAddress,

    #[error("weight is required for {} parcels", .0.as_str())]
    MissingWeight(PackageType),

    #[error("delivery speed must be selected")]
    MissingDeliverySpeed,

    #[error("scheduled delivery needs a delivery time")]
    MissingScheduledTime,

    #[error("cash-on-delivery amount cannot be negative")]
    NegativeCodAmount,

    #[error("cash on delivery is only available to partner and VIP customers")]
    CodNotAllowed,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot {action} an order in state {state:?}")]
    InvalidTransition {
        state: OrderState,
        action: &'static str,
    },

    #[error("pending order {0} not found")]
    PendingOrderNotFound(TrackingId),

    #[error("payment method {} is not enabled", .0.as_str())]
    PaymentMethodUnavailable(PaymentMethod),

    #[error("tracking id {0} already belongs to another package")]
    TrackingIdConflict(TrackingId),

    #[error("no free tracking id after {attempts} attempts")]
    TrackingIdExhausted { attempts: u32 },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    /// Whether repeating the same call, without changing input, may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderError::TrackingIdExhausted { .. } => true,
            OrderError::Persistence(err) => matches!(
                err,
                StoreError::Unavailable(_) | StoreError::DuplicateKey(_)
            ),
            OrderError::Validation(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::PendingOrderNotFound(_)
            | OrderError::TrackingIdConflict(_)
            | OrderError::PaymentMethodUnavailable(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::Validation(_) => AppError::BadRequest(message),
            OrderError::PendingOrderNotFound(_) => AppError::NotFound(message),
            OrderError::InvalidTransition { .. }
            | OrderError::TrackingIdConflict(_)
            | OrderError::TrackingIdExhausted { .. } => AppError::Conflict(message),
            OrderError::PaymentMethodUnavailable(_) => AppError::Unprocessable(message),
            OrderError::Persistence(StoreError::Decode(_)) => AppError::Internal(message),
            OrderError::Persistence(_) => AppError::Unavailable(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
