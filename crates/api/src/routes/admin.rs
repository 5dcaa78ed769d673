//! Back-office endpoints for orders, products and dashboard stats.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{CartStorage, DomainError, Order, Product, ProductInput};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, OrderStore, StoreStats, Storefront};

use super::orders::MessageResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ProductSavedResponse {
    pub message: &'static str,
    pub product: Product,
}

/// GET /api/admin/orders: every order, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_orders<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.order_service.list_orders().await?))
}

/// PUT /api/admin/orders/{id}/status: status change under the configured policy.
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let Json(request) = body?;
    let status = request
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or(DomainError::MissingField("Status"))?;

    let order = state
        .order_service
        .update_status_str(order_id, &status)
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Order #{} status updated to {}", order.id, order.status),
    }))
}

/// GET /api/admin/stats: delivered revenue plus order and product counts.
#[tracing::instrument(skip(state))]
pub async fn stats<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.store().stats().await?))
}

/// GET /api/admin/products: the full catalog, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_products<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.store().list_products(None).await?))
}

/// POST /api/admin/products
#[tracing::instrument(skip(state, body))]
pub async fn create_product<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductSavedResponse>), ApiError> {
    let Json(input) = body?;
    let product = state.store().create_product(input.validate()?).await?;
    tracing::info!(product_id = %product.id, "product created");

    Ok((
        StatusCode::CREATED,
        Json(ProductSavedResponse {
            message: "Product added successfully!",
            product,
        }),
    ))
}

/// PUT /api/admin/products/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update_product<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<Json<ProductSavedResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    let Json(input) = body?;
    let product = state
        .store()
        .update_product(product_id, input.validate()?)
        .await?;

    Ok(Json(ProductSavedResponse {
        message: "Product updated successfully!",
        product,
    }))
}

/// DELETE /api/admin/products/{id}
///
/// Past order lines keep their name and price snapshots.
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    state.store().delete_product(product_id).await?;
    tracing::info!(product_id = %product_id, "product deleted");

    Ok(Json(MessageResponse {
        message: "Product deleted successfully.".to_string(),
    }))
}
