//! Customer order endpoints: checkout, lookup, cancellation and history.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{CartStorage, CheckoutRequest, Order, OrderDetails, PaymentRecord};
use serde::{Deserialize, Serialize};
use store::Storefront;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub message: &'static str,
    pub order_id: OrderId,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

/// POST /api/place-order: check stock, write the order and queue the confirmation.
#[tracing::instrument(skip(state, body))]
pub async fn place<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let Json(request) = body?;
    let details = state.order_service.place_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            message: "Order placed successfully!",
            order_id: details.order.id,
        }),
    ))
}

/// GET /api/orders/{order_id}: order header with its line items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id = parse_id(&order_id)?;
    Ok(Json(state.order_service.get_order(order_id).await?))
}

/// PUT /api/orders/{order_id}/cancel: cancel and restock.
///
/// An order that is already delivered or cancelled answers 409 Conflict
/// with the transition message, not a generic 500.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(order_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let order_id = parse_id(&order_id)?;
    state.order_service.cancel_order(order_id).await?;

    Ok(Json(MessageResponse {
        message: "Order has been cancelled and items restocked.".to_string(),
    }))
}

/// GET /api/my-orders?email=: the customer's orders, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn my_orders<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let email = query.email.unwrap_or_default();
    Ok(Json(state.order_service.orders_for_customer(&email).await?))
}

/// GET /api/payment-history?email=: non-cancelled orders with product names.
#[tracing::instrument(skip(state, query))]
pub async fn payment_history<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    let email = query.email.unwrap_or_default();
    Ok(Json(state.order_service.payment_history(&email).await?))
}
