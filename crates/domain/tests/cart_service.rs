//! Integration tests for the cart service over in-memory storage.

use common::ProductId;
use domain::{
    CartError, CartItem, CartOwner, CartService, InMemoryCartStorage, MAX_ITEM_QUANTITY, Money,
};

fn service() -> CartService<InMemoryCartStorage> {
    CartService::new(InMemoryCartStorage::new())
}

fn item(id: i64, price: i64) -> CartItem {
    CartItem {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Money::new(price),
        image_url: format!("/img/{id}.png"),
        quantity: 1,
    }
}

fn guest(id: &str) -> CartOwner {
    CartOwner::Guest(id.to_string())
}

fn user(email: &str) -> CartOwner {
    CartOwner::User(email.to_string())
}

#[tokio::test]
async fn missing_cart_is_empty() {
    let service = service();
    let cart = service.get(&guest("nobody")).await.unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn add_update_and_remove_items() {
    let service = service();
    let owner = guest("s1");

    service.add_item(&owner, item(1, 500), 1).await.unwrap();
    service.add_item(&owner, item(1, 500), 2).await.unwrap();
    let cart = service.add_item(&owner, item(2, 250), 1).await.unwrap();
    assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
    assert_eq!(cart.total_items(), 4);

    let cart = service
        .update_quantity(&owner, ProductId::new(2), 5)
        .await
        .unwrap();
    assert_eq!(cart.get(ProductId::new(2)).unwrap().quantity, 5);

    let cart = service.remove_item(&owner, ProductId::new(1)).await.unwrap();
    assert_eq!(cart.items.len(), 1);

    let stored = service.get(&owner).await.unwrap();
    assert_eq!(stored, cart);
}

#[tokio::test]
async fn add_rejects_non_positive_quantity() {
    let service = service();
    let result = service.add_item(&guest("s1"), item(1, 500), 0).await;
    assert!(matches!(result, Err(CartError::InvalidQuantity(0))));
}

#[tokio::test]
async fn quantities_above_line_limit_are_rejected() {
    let service = service();
    let owner = guest("s1");
    let huge = i64::from(u32::MAX);

    let result = service.add_item(&owner, item(1, 500), huge).await;
    assert!(matches!(result, Err(CartError::InvalidQuantity(q)) if q == huge));

    service.add_item(&owner, item(1, 500), 1).await.unwrap();
    let result = service
        .update_quantity(&owner, ProductId::new(1), i64::from(MAX_ITEM_QUANTITY) + 1)
        .await;
    assert!(matches!(result, Err(CartError::InvalidQuantity(_))));
    assert_eq!(service.get(&owner).await.unwrap().total_items(), 1);
}

#[tokio::test]
async fn repeated_adds_stay_within_line_limit() {
    let service = service();
    let owner = guest("s1");
    let max = i64::from(MAX_ITEM_QUANTITY);

    service.add_item(&owner, item(1, 500), max).await.unwrap();
    service.add_item(&owner, item(1, 500), max).await.unwrap();
    let cart = service.add_item(&owner, item(2, 250), 1).await.unwrap();

    assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, MAX_ITEM_QUANTITY);
    assert_eq!(cart.total_items(), u64::from(MAX_ITEM_QUANTITY) + 1);
    assert_eq!(cart.totals().subtotal, Money::new(500 * max + 250));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_for_one_owner_are_all_kept() {
    let service = service();
    let owner = guest("two-tabs");

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let service = service.clone();
            let owner = owner.clone();
            tokio::spawn(async move { service.add_item(&owner, item(i % 5, 100), 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cart = service.get(&owner).await.unwrap();
    assert_eq!(cart.items.len(), 5);
    assert_eq!(cart.total_items(), 50);
}

#[tokio::test]
async fn merge_sums_matching_items_and_appends_new_ones() {
    let service = service();
    let guest_owner = guest("s1");
    let user_owner = user("asha@example.com");

    service.add_item(&user_owner, item(1, 500), 1).await.unwrap();
    service.add_item(&guest_owner, item(1, 500), 2).await.unwrap();
    service.add_item(&guest_owner, item(3, 900), 1).await.unwrap();

    let merged = service
        .merge_carts("s1", "Asha@Example.com")
        .await
        .unwrap();

    assert_eq!(merged.items.len(), 2);
    assert_eq!(merged.get(ProductId::new(1)).unwrap().quantity, 3);
    assert_eq!(merged.get(ProductId::new(3)).unwrap().quantity, 1);

    assert!(service.get(&guest_owner).await.unwrap().is_empty());
    assert_eq!(service.storage().cart_count().await, 1);
    assert_eq!(service.get(&user_owner).await.unwrap(), merged);
}

#[tokio::test]
async fn merge_without_guest_cart_keeps_user_cart() {
    let service = service();
    let user_owner = user("asha@example.com");
    service.add_item(&user_owner, item(1, 500), 2).await.unwrap();

    let merged = service
        .merge_carts("unknown", "asha@example.com")
        .await
        .unwrap();
    assert_eq!(merged.total_items(), 2);
}

#[tokio::test]
async fn clear_removes_cart() {
    let service = service();
    let owner = guest("s1");
    service.add_item(&owner, item(1, 500), 1).await.unwrap();

    let cart = service.clear(&owner).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(service.storage().cart_count().await, 0);
}
