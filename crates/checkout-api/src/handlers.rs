//! # Request Handlers
//!
//! Axum request handlers for the checkout API: session creation, payment
//! confirmation, and placed-order lookup.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use checkout_core::{
    BillingDetail, CheckoutError, ConfirmContext, Currency, PaymentCollection, PaymentSession,
    PlacedOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Seed a payment collection (development mode only; production collections
/// are owned by the commerce backend's cart aggregate)
#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    /// Collection currency
    #[serde(default)]
    pub currency: Currency,
    /// Total amount due in the smallest currency unit
    pub amount_due: i64,
}

/// Create (or idempotently reuse) the active payment session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Provider identifier (e.g., "pp_stripe_card")
    pub provider_id: String,
    /// Amount this session should settle
    pub amount: i64,
}

/// Confirm the active session and place the order
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Amount this confirmation should settle
    pub amount: i64,
    /// Buyer/billing details forwarded to the provider
    #[serde(default)]
    pub billing_detail: BillingDetail,
    /// Readiness facts from the cart aggregate
    #[serde(default)]
    pub has_shipping_address: bool,
    #[serde(default)]
    pub has_billing_address: bool,
    #[serde(default)]
    pub shipping_method_count: usize,
}

impl ConfirmRequest {
    fn into_context(self) -> ConfirmContext {
        ConfirmContext {
            billing: self.billing_detail,
            has_shipping_address: self.has_shipping_address,
            has_billing_address: self.has_billing_address,
            shipping_method_count: self.shipping_method_count,
            amount: self.amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub payment_collection: PaymentCollection,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub payment_session: PaymentSession,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub order: PlacedOrder,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    /// Machine-readable kind; `completion_gate` means the payment
    /// succeeded and only order placement failed
    pub kind: &'static str,
}

fn error_to_response(err: CheckoutError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse {
        error: err.to_string(),
        code,
        kind: err.kind(),
    };
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "checkout-orchestra",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Seed a payment collection (development mode)
#[instrument(skip(state, request))]
pub async fn create_collection(
    State(state): State<AppState>,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<Json<CollectionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let store = state.seed_store.as_ref().ok_or_else(|| {
        error_to_response(CheckoutError::Configuration(
            "payment collections are owned by the commerce backend".to_string(),
        ))
    })?;

    if request.amount_due <= 0 {
        return Err(error_to_response(CheckoutError::InvalidAmount {
            message: format!("amount due must be positive, got {}", request.amount_due),
        }));
    }

    let collection_id = store
        .register_collection(request.currency, request.amount_due)
        .await;
    info!(%collection_id, amount_due = request.amount_due, "collection seeded");

    let payment_collection = state
        .store
        .collection(&collection_id)
        .await
        .map_err(error_to_response)?;
    Ok(Json(CollectionResponse { payment_collection }))
}

/// Select a provider and ensure the active payment session
#[instrument(skip(state, request), fields(collection_id = %collection_id, provider_id = %request.provider_id))]
pub async fn create_session(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine_for(&collection_id).await;

    let pre_created = engine
        .select_provider(&request.provider_id, request.amount)
        .await
        .map_err(|err| {
            error!("provider selection failed: {}", err);
            error_to_response(err)
        })?;

    let payment_session = match pre_created {
        Some(session) => session,
        None => engine
            .create_session(request.amount)
            .await
            .map_err(error_to_response)?,
    };

    Ok(Json(SessionResponse { payment_session }))
}

/// Confirm the active session; on success the order is placed exactly once
#[instrument(skip(state, request), fields(collection_id = %collection_id))]
pub async fn confirm(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine_for(&collection_id).await;
    let ctx = request.into_context();

    let order = engine.confirm(&ctx).await.map_err(|err| {
        error!("confirmation failed: {}", err);
        error_to_response(err)
    })?;

    info!(order_id = %order.id, "order placed");
    Ok(Json(ConfirmResponse { order }))
}

/// Placed-order lookup for the confirmation page
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ConfirmResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .orders
        .retrieve_order(&order_id)
        .await
        .map_err(error_to_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Order not found: {}", order_id),
                    code: 404,
                    kind: "order_not_found",
                }),
            )
        })?;

    Ok(Json(ConfirmResponse { order }))
}
