//! Reservation lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CouponId, EventId, TransactionId};
use lifecycle::{CheckoutRequest, Decision, LifecycleEngine};
use serde::{Deserialize, Serialize};
use store::{TicketStore, Transaction};

use crate::auth::{Principal, Role};
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: TicketStore> {
    pub engine: LifecycleEngine<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub event_id: uuid::Uuid,
    #[serde(default)]
    pub use_points: bool,
    pub coupon_id: Option<uuid::Uuid>,
}

#[derive(Deserialize)]
pub struct ProofBody {
    pub proof_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionBody {
    Approve,
    Reject,
}

// -- Response types --

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub event_id: String,
    pub customer_id: String,
    pub status: String,
    pub total_price: i64,
    pub expires_at: String,
    pub payment_proof_url: Option<String>,
    pub created_at: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.id.to_string(),
            event_id: txn.event_id.to_string(),
            customer_id: txn.customer_id.to_string(),
            status: txn.status.as_str().to_string(),
            total_price: txn.total_price.minor(),
            expires_at: txn.expires_at.to_rfc3339(),
            payment_proof_url: txn.payment_proof_url,
            created_at: txn.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /transactions/checkout — reserve one seat for an event.
#[tracing::instrument(skip(state, principal, body), fields(customer = %principal.user_id))]
pub async fn checkout<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    principal.require(Role::Customer)?;

    let txn = state
        .engine
        .checkout(CheckoutRequest {
            customer_id: principal.user_id,
            event_id: EventId::from_uuid(body.event_id),
            use_points: body.use_points,
            coupon_id: body.coupon_id.map(CouponId::from_uuid),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(txn.into())))
}

/// GET /transactions — list the caller's transactions, newest hold first.
#[tracing::instrument(skip(state, principal), fields(customer = %principal.user_id))]
pub async fn list<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    principal.require(Role::Customer)?;

    let txns = state.engine.my_transactions(principal.user_id).await?;
    Ok(Json(txns.into_iter().map(Into::into).collect()))
}

/// GET /transactions/:id — load one of the caller's transactions.
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    principal.require(Role::Customer)?;

    let id = parse_transaction_id(&id)?;
    let txn = state.engine.transaction_for(id, principal.user_id).await?;
    Ok(Json(txn.into()))
}

/// POST /transactions/:id/proof — attach a payment proof reference.
#[tracing::instrument(skip(state, principal, body))]
pub async fn upload_proof<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<ProofBody>,
) -> Result<Json<TransactionResponse>, ApiError> {
    principal.require(Role::Customer)?;

    let id = parse_transaction_id(&id)?;
    let txn = state
        .engine
        .upload_proof(id, principal.user_id, &body.proof_url)
        .await?;
    Ok(Json(txn.into()))
}

/// POST /transactions/:id/decision — approve or reject a payment.
#[tracing::instrument(skip(state, principal, body), fields(organizer = %principal.user_id))]
pub async fn decide<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<TransactionResponse>, ApiError> {
    principal.require(Role::Organizer)?;

    let id = parse_transaction_id(&id)?;
    let decision = match body {
        DecisionBody::Approve => Decision::Approve,
        DecisionBody::Reject => Decision::Reject,
    };
    let txn = state.engine.decide(id, principal.user_id, decision).await?;
    Ok(Json(txn.into()))
}

/// POST /transactions/:id/cancel — cancel an unpaid reservation.
#[tracing::instrument(skip(state, principal))]
pub async fn cancel<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    principal.require(Role::Customer)?;

    let id = parse_transaction_id(&id)?;
    let txn = state.engine.cancel(id, principal.user_id).await?;
    Ok(Json(txn.into()))
}

/// GET /events/:id/approvals — the organizer's approval inbox for an event.
#[tracing::instrument(skip(state, principal), fields(organizer = %principal.user_id))]
pub async fn approvals<S: TicketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    principal.require(Role::Organizer)?;

    let event_id = uuid::Uuid::parse_str(&id)
        .map(EventId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("invalid event id: {e}")))?;
    let txns = state
        .engine
        .approvals(event_id, principal.user_id)
        .await?;
    Ok(Json(txns.into_iter().map(Into::into).collect()))
}

fn parse_transaction_id(id: &str) -> Result<TransactionId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(TransactionId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("invalid transaction id: {e}")))
}
