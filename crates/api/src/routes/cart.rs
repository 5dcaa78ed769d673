//! Session-scoped cart endpoints.
//!
//! Carts are addressed as `/api/carts/{kind}/{id}` where `kind` is `guest`
//! (anonymous browser session) or `user` (signed-in email).

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{Cart, CartItem, CartOwner, CartStorage, DomainError, Money};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, Storefront};

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub guest_cart_id: String,
    pub user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let totals = cart.totals();
        Self {
            total_items: cart.total_items(),
            items: cart.items,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            total: totals.total,
        }
    }
}

fn owner(kind: &str, id: &str) -> Result<CartOwner, ApiError> {
    CartOwner::parse(kind, id)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown cart owner: {kind}/{id}")))
}

/// GET /api/carts/{kind}/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = owner(&kind, &id)?;
    Ok(Json(state.cart_service.get(&owner).await?.into()))
}

/// POST /api/carts/{kind}/{id}/items: add units of a catalog product.
#[tracing::instrument(skip(state, body))]
pub async fn add_item<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((kind, id)): Path<(String, String)>,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = owner(&kind, &id)?;
    let Json(request) = body?;
    let product = state
        .store()
        .get_product(request.product_id)
        .await?
        .ok_or(DomainError::UnknownProduct(request.product_id))?;

    let cart = state
        .cart_service
        .add_item(
            &owner,
            CartItem::from_product(&product),
            request.quantity.unwrap_or(1),
        )
        .await?;
    Ok(Json(cart.into()))
}

/// PUT /api/carts/{kind}/{id}/items/{product_id}: set a quantity; zero removes.
#[tracing::instrument(skip(state, body))]
pub async fn update_item<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((kind, id, product_id)): Path<(String, String, String)>,
    body: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = owner(&kind, &id)?;
    let product_id: ProductId = parse_id(&product_id)?;
    let Json(request) = body?;

    let cart = state
        .cart_service
        .update_quantity(&owner, product_id, request.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /api/carts/{kind}/{id}/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((kind, id, product_id)): Path<(String, String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = owner(&kind, &id)?;
    let product_id: ProductId = parse_id(&product_id)?;
    Ok(Json(
        state.cart_service.remove_item(&owner, product_id).await?.into(),
    ))
}

/// DELETE /api/carts/{kind}/{id}
#[tracing::instrument(skip(state))]
pub async fn clear<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let owner = owner(&kind, &id)?;
    Ok(Json(state.cart_service.clear(&owner).await?.into()))
}

/// POST /api/carts/merge: fold a guest cart into the user's cart after login.
#[tracing::instrument(skip(state, body))]
pub async fn merge<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    body: Result<Json<MergeRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(request) = body?;
    let cart = state
        .cart_service
        .merge_carts(&request.guest_cart_id, &request.user_id)
        .await?;
    Ok(Json(cart.into()))
}
