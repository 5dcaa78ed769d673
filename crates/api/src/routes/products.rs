//! Public catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::ProductId;
use domain::{CartStorage, Product};
use serde::Deserialize;
use store::{CatalogStore, Storefront};

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// GET /api/products?search=: products whose name contains `search`, any case.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(state.store().list_products(search).await?))
}

/// GET /api/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Storefront, C: CartStorage + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    state
        .store()
        .get_product(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}
