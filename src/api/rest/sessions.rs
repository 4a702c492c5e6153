use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::session::OrderSession;
use crate::error::AppError;
use crate::models::order::{CustomerRef, OrderDraft, PaymentMethod, StoreAffiliation};
use crate::models::package::PackageRecord;
use crate::state::{AppState, SharedSession};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(abandon_session))
        .route("/sessions/:id/quote", post(requote))
        .route("/sessions/:id/hold", post(hold))
        .route("/sessions/:id/confirm", post(confirm))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub draft: OrderDraft,
    #[serde(default)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub store: Option<StoreAffiliation>,
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_method: PaymentMethod,
}

fn lookup(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state
        .session(&id)
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<OrderSession>, AppError> {
    let mut session = OrderSession::new(payload.customer, payload.store);
    state.service.quote(&mut session, payload.draft).await?;

    state.insert_session(session.clone());
    Ok(Json(session))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderSession>, AppError> {
    let shared = lookup(&state, id)?;
    let session = shared.lock().await;
    Ok(Json(session.clone()))
}

async fn requote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(draft): Json<OrderDraft>,
) -> Result<Json<OrderSession>, AppError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    state.service.quote(&mut session, draft).await?;
    Ok(Json(session.clone()))
}

async fn hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderSession>, AppError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    state.service.hold(&mut session).await?;
    Ok(Json(session.clone()))
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<PackageRecord>, AppError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    let record = state
        .service
        .confirm_payment(&mut session, payload.payment_method)
        .await?;
    Ok(Json(record))
}

async fn abandon_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderSession>, AppError> {
    let shared = lookup(&state, id)?;
    let mut session = shared.lock().await;
    state.service.abandon(&mut session)?;
    state.sessions.remove(&id);
    Ok(Json(session.clone()))
}
