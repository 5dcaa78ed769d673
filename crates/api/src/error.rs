//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError};
use orders::OrderServiceError;
use store::StoreError;

const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again later.";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Business rule rejection.
    Domain(DomainError),
    /// Storage failure.
    Store(StoreError),
    /// Cart operation failure.
    Cart(CartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Cart(err) => cart_error_to_response(err),
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
        DomainError::UnknownProduct(_) => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. }
        | DomainError::EmptyOrder
        | DomainError::InvalidQuantity { .. }
        | DomainError::MissingField(_)
        | DomainError::UnknownStatus(_)
        | DomainError::AmountOverflow
        | DomainError::InvalidProduct(_) => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::Domain(err) => domain_error_to_response(err),
        StoreError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "Order not found.".to_string()),
        StoreError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "Product not found".to_string()),
        other => {
            tracing::error!(error = %other, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, String) {
    match err {
        CartError::InvalidQuantity(_) | CartError::MissingOwner => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CartError::Storage(msg) => {
            tracing::error!(error = %msg, "cart storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        match err {
            OrderServiceError::Domain(e) => ApiError::Domain(e),
            OrderServiceError::OrderNotFound(_) => ApiError::NotFound("Order not found.".to_string()),
            OrderServiceError::ProductNotFound(_) => {
                ApiError::NotFound("Product not found".to_string())
            }
            OrderServiceError::Storage(e) => ApiError::Store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
