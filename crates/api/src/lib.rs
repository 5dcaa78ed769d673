//! HTTP API server for the storefront order service.
//!
//! Exposes checkout, order lookup and cancellation, admin order and catalog
//! management, and session carts, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartService, CartStorage, StatusPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::OrderService;
use store::Storefront;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Storefront, C: CartStorage + 'static>(
    state: Arc<AppState<S, C>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin, cart, health, metrics, orders, products};

    let metrics_router = Router::new()
        .route("/metrics", get(metrics::render))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/place-order", post(orders::place::<S, C>))
        .route("/orders/{order_id}", get(orders::get::<S, C>))
        .route("/orders/{order_id}/cancel", put(orders::cancel::<S, C>))
        .route("/my-orders", get(orders::my_orders::<S, C>))
        .route("/payment-history", get(orders::payment_history::<S, C>))
        .route("/products", get(products::list::<S, C>))
        .route("/products/{id}", get(products::get::<S, C>))
        .route("/admin/orders", get(admin::list_orders::<S, C>))
        .route("/admin/orders/{id}/status", put(admin::update_status::<S, C>))
        .route("/admin/stats", get(admin::stats::<S, C>))
        .route(
            "/admin/products",
            get(admin::list_products::<S, C>).post(admin::create_product::<S, C>),
        )
        .route(
            "/admin/products/{id}",
            put(admin::update_product::<S, C>).delete(admin::delete_product::<S, C>),
        )
        .route("/carts/merge", post(cart::merge::<S, C>))
        .route(
            "/carts/{kind}/{id}",
            get(cart::get::<S, C>).delete(cart::clear::<S, C>),
        )
        .route("/carts/{kind}/{id}/items", post(cart::add_item::<S, C>))
        .route(
            "/carts/{kind}/{id}/items/{product_id}",
            put(cart::update_item::<S, C>).delete(cart::remove_item::<S, C>),
        );

    Router::new()
        .route("/health", get(health::check))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the shared state over a store and a cart backend.
///
/// `dispatcher_wake` is notified whenever an order mutation queues an email.
pub fn create_state<S: Storefront, C: CartStorage>(
    store: S,
    carts: C,
    policy: StatusPolicy,
    dispatcher_wake: Arc<Notify>,
) -> Arc<AppState<S, C>> {
    let order_service = OrderService::new(store)
        .with_policy(policy)
        .with_dispatcher_wake(dispatcher_wake);

    Arc::new(AppState {
        order_service,
        cart_service: CartService::new(carts),
    })
}
