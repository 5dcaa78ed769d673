//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Each test works on its own
//! products and customer emails, so they can run in parallel:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::ProductId;
use domain::{
    Cart, CartItem, CartOwner, CartStorage, DomainError, DraftLine, Money, NotificationKind,
    OrderDraft, OrderStatus, ProductDraft, StatusPolicy,
};
use sqlx::PgPool;
use store::{
    CatalogStore, DeliveryStatus, NotificationOutbox, OrderStore, PostgresCartStorage,
    PostgresStore, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Product name rejected by a test-only constraint on `order_items`, used
/// to make a checkout fail after its header row is written.
const POISON: &str = "Poisoned Line Item";

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            sqlx::raw_sql(&format!(
                "ALTER TABLE order_items ADD CONSTRAINT reject_poison \
                 CHECK (product_name <> '{POISON}')"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a store with its own pool
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn product(name: &str, price: i64, stock: u32) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        brand: "SG".to_string(),
        category: "Cricket".to_string(),
        regular_price: Some(Money::new(price + 100)),
        discount_price: Money::new(price),
        stock,
        image_url: format!("/img/{}.png", name.replace(' ', "-")),
        description: "test product".to_string(),
    }
}

fn draft(email: &str, lines: &[(ProductId, u32)]) -> OrderDraft {
    OrderDraft {
        customer_email: email.to_string(),
        customer_name: "Asha Rao".to_string(),
        phone: "9999999999".to_string(),
        shipping_address: "1 MG Road, Bengaluru, KA - 560001".to_string(),
        payment_method: "COD".to_string(),
        lines: lines
            .iter()
            .map(|(product_id, quantity)| DraftLine {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

async fn stock_of(store: &PostgresStore, id: ProductId) -> u32 {
    store.get_product(id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn product_crud_round_trip() {
    let store = get_test_store().await;

    let created = store
        .create_product(product("Kashmir Willow Bat", 2499, 7))
        .await
        .unwrap();
    assert_eq!(created.regular_price, Some(Money::new(2599)));

    let mut changed = product("Kashmir Willow Bat Pro", 2999, 3);
    changed.regular_price = None;
    let updated = store.update_product(created.id, changed).await.unwrap();
    assert_eq!(updated.name, "Kashmir Willow Bat Pro");

    let loaded = store.get_product(created.id).await.unwrap().unwrap();
    assert_eq!(loaded, updated);

    let found = store.list_products(Some("willow bat pro")).await.unwrap();
    assert!(found.iter().any(|p| p.id == created.id));

    store.delete_product(created.id).await.unwrap();
    assert!(store.get_product(created.id).await.unwrap().is_none());
    assert!(matches!(
        store.delete_product(created.id).await,
        Err(StoreError::ProductNotFound(_))
    ));
}

#[tokio::test]
async fn place_order_snapshots_prices_and_debits_stock() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Place Bat", 1500, 10)).await.unwrap();
    let ball = store.create_product(product("Place Ball", 250, 10)).await.unwrap();

    let details = store
        .place_order(&draft("place@example.com", &[(bat.id, 2), (ball.id, 2)]))
        .await
        .unwrap();

    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.total_amount, Money::new(3550));
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.items[0].product_name, "Place Bat");
    assert_eq!(details.items[0].price, Money::new(1500));
    assert_eq!(stock_of(&store, bat.id).await, 8);
    assert_eq!(stock_of(&store, ball.id).await, 8);

    // later price changes do not touch the stored line
    store
        .update_product(bat.id, product("Place Bat", 9999, 8))
        .await
        .unwrap();
    let stored = store.get_order(details.order.id).await.unwrap().unwrap();
    assert_eq!(stored, details);

    let outbox = store
        .notifications_for_order(details.order.id)
        .await
        .unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].kind, NotificationKind::OrderConfirmation);
    assert_eq!(outbox[0].message.to, "place@example.com");
    assert_eq!(outbox[0].status, DeliveryStatus::Pending);
}

#[tokio::test]
async fn insufficient_stock_rejects_whole_order() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Short Bat", 1500, 10)).await.unwrap();
    let ball = store.create_product(product("Short Ball", 250, 1)).await.unwrap();
    let email = "short@example.com";

    let err = store
        .place_order(&draft(email, &[(bat.id, 2), (ball.id, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InsufficientStock {
            available: 1,
            requested: 2,
            ..
        })
    ));
    assert_eq!(stock_of(&store, bat.id).await, 10);
    assert_eq!(stock_of(&store, ball.id).await, 1);
    assert!(store.orders_for_customer(email).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let store = get_test_store().await;
    let err = store
        .place_order(&draft("ghost@example.com", &[(ProductId::new(i64::MAX), 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Domain(DomainError::UnknownProduct(_))
    ));
}

#[tokio::test]
async fn failed_line_insert_rolls_back_header_and_stock() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Atomic Bat", 1500, 10)).await.unwrap();
    let poison = store.create_product(product(POISON, 10, 10)).await.unwrap();
    let email = "atomic@example.com";

    let err = store
        .place_order(&draft(email, &[(bat.id, 1), (poison.id, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Database(_)));
    assert!(store.orders_for_customer(email).await.unwrap().is_empty());
    assert_eq!(stock_of(&store, bat.id).await, 10);
    assert_eq!(stock_of(&store, poison.id).await, 10);
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let store = get_test_store().await;
    let bat_id = store
        .create_product(product("Race Bat", 1500, 5))
        .await
        .unwrap()
        .id;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..12 {
        let store = store.clone();
        let email = format!("race{i}@example.com");
        tasks.spawn(async move { store.place_order(&draft(&email, &[(bat_id, 1)])).await });
    }

    let mut placed = 0;
    let mut rejected = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(StoreError::Domain(DomainError::InsufficientStock { .. })) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(rejected, 7);
    assert_eq!(stock_of(&store, bat_id).await, 0);
}

#[tokio::test]
async fn cancel_restores_stock_once() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Cancel Bat", 1500, 4)).await.unwrap();
    let order = store
        .place_order(&draft("cancel@example.com", &[(bat.id, 3)]))
        .await
        .unwrap()
        .order;
    assert_eq!(stock_of(&store, bat.id).await, 1);

    let cancelled = store.cancel_order(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, bat.id).await, 4);

    let err = store.cancel_order(order.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InvalidTransition { .. })
    ));
    assert_eq!(stock_of(&store, bat.id).await, 4);

    let kinds: Vec<_> = store
        .notifications_for_order(order.id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::OrderConfirmation,
            NotificationKind::OrderCancellation
        ]
    );
}

#[tokio::test]
async fn cancel_after_product_deleted_keeps_snapshot() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Gone Bat", 1500, 4)).await.unwrap();
    let order = store
        .place_order(&draft("gone@example.com", &[(bat.id, 1)]))
        .await
        .unwrap()
        .order;

    store.delete_product(bat.id).await.unwrap();
    store.cancel_order(order.id).await.unwrap();

    let details = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(details.items[0].product_name, "Gone Bat");
    assert!(details.items[0].image_url.is_none());
}

#[tokio::test]
async fn delivered_orders_cannot_be_cancelled() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Deliver Bat", 1500, 4)).await.unwrap();
    let order = store
        .place_order(&draft("deliver@example.com", &[(bat.id, 1)]))
        .await
        .unwrap()
        .order;

    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        let updated = store
            .update_order_status(order.id, status, StatusPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(updated.order.status, status);
        assert!(updated.changed());
    }

    assert!(matches!(
        store.cancel_order(order.id).await,
        Err(StoreError::Domain(DomainError::InvalidTransition { .. }))
    ));
    assert!(
        store
            .update_order_status(order.id, OrderStatus::Shipped, StatusPolicy::Strict)
            .await
            .is_err()
    );
    assert_eq!(stock_of(&store, bat.id).await, 3);
}

#[tokio::test]
async fn shipped_orders_can_still_be_cancelled() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Shipped Bat", 1500, 4)).await.unwrap();
    let order = store
        .place_order(&draft("shipped@example.com", &[(bat.id, 2)]))
        .await
        .unwrap()
        .order;

    store
        .update_order_status(order.id, OrderStatus::Shipped, StatusPolicy::Permissive)
        .await
        .unwrap();
    store.cancel_order(order.id).await.unwrap();

    assert_eq!(stock_of(&store, bat.id).await, 4);
}

#[tokio::test]
async fn admin_cancel_goes_through_restock() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Admin Bat", 1500, 4)).await.unwrap();
    let order = store
        .place_order(&draft("admin-cancel@example.com", &[(bat.id, 2)]))
        .await
        .unwrap()
        .order;

    let cancelled = store
        .update_order_status(order.id, OrderStatus::Cancelled, StatusPolicy::Permissive)
        .await
        .unwrap();

    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.previous, OrderStatus::Pending);
    assert_eq!(stock_of(&store, bat.id).await, 4);

    let repeat = store
        .update_order_status(order.id, OrderStatus::Cancelled, StatusPolicy::Permissive)
        .await
        .unwrap();
    assert!(!repeat.changed());
    assert_eq!(stock_of(&store, bat.id).await, 4);
    assert!(
        store
            .update_order_status(order.id, OrderStatus::Pending, StatusPolicy::Permissive)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn payment_history_excludes_cancelled_orders() {
    let store = get_test_store().await;
    let bat = store.create_product(product("History Bat", 1500, 10)).await.unwrap();
    let ball = store.create_product(product("History Ball", 250, 10)).await.unwrap();
    let email = "history@example.com";

    let kept = store
        .place_order(&draft(email, &[(bat.id, 1), (ball.id, 1)]))
        .await
        .unwrap()
        .order;
    let dropped = store
        .place_order(&draft(email, &[(ball.id, 1)]))
        .await
        .unwrap()
        .order;
    store.cancel_order(dropped.id).await.unwrap();

    let history = store.payment_history(email).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, kept.id);
    assert_eq!(history[0].products, "History Bat, History Ball");

    let orders = store.orders_for_customer(email).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, dropped.id);
}

#[tokio::test]
async fn outbox_failure_and_delivery_bookkeeping() {
    let store = get_test_store().await;
    let bat = store.create_product(product("Outbox Bat", 1500, 10)).await.unwrap();
    let order = store
        .place_order(&draft("outbox@example.com", &[(bat.id, 1)]))
        .await
        .unwrap()
        .order;
    let id = store.notifications_for_order(order.id).await.unwrap()[0].id;

    let claimed = store.claim_due(100, Duration::from_secs(60)).await.unwrap();
    assert!(claimed.iter().any(|m| m.id == id));
    let again = store.claim_due(100, Duration::from_secs(60)).await.unwrap();
    assert!(again.iter().all(|m| m.id != id));

    store
        .record_failure(id, "smtp down", Some(chrono::Utc::now()))
        .await
        .unwrap();
    let message = &store.notifications_for_order(order.id).await.unwrap()[0];
    assert_eq!(message.attempts, 1);
    assert_eq!(message.status, DeliveryStatus::Pending);
    assert_eq!(message.last_error.as_deref(), Some("smtp down"));

    store.mark_sent(id).await.unwrap();
    let message = &store.notifications_for_order(order.id).await.unwrap()[0];
    assert_eq!(message.status, DeliveryStatus::Sent);
    assert_eq!(message.attempts, 2);
    assert!(message.sent_at.is_some());
}

#[tokio::test]
async fn stats_count_delivered_revenue() {
    let store = get_test_store().await;
    let before = store.stats().await.unwrap();

    let bat = store.create_product(product("Stats Bat", 6000, 10)).await.unwrap();
    let order = store
        .place_order(&draft("stats@example.com", &[(bat.id, 1)]))
        .await
        .unwrap()
        .order;
    store
        .update_order_status(order.id, OrderStatus::Delivered, StatusPolicy::Permissive)
        .await
        .unwrap();

    let after = store.stats().await.unwrap();
    assert!(after.total_orders > before.total_orders);
    assert!(after.total_revenue.amount() >= before.total_revenue.amount() + 6000);
}

#[tokio::test]
async fn carts_persist_as_json() {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    let storage = PostgresCartStorage::new(pool);
    let owner = CartOwner::Guest("pg-session-1".to_string());

    assert!(storage.load(&owner).await.unwrap().is_none());

    let cart = Cart {
        items: vec![CartItem {
            product_id: ProductId::new(1),
            name: "Bat".to_string(),
            price: Money::new(1500),
            image_url: "/img/bat.png".to_string(),
            quantity: 2,
        }],
    };
    storage.save(&owner, &cart).await.unwrap();
    assert_eq!(storage.load(&owner).await.unwrap(), Some(cart));

    storage.delete(&owner).await.unwrap();
    assert!(storage.load(&owner).await.unwrap().is_none());
}
