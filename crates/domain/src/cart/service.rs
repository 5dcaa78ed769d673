//! Cart service over an injected storage backend.

use std::collections::HashMap;
use std::sync::Arc;

use common::ProductId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Cart, CartError, CartItem, CartOwner, CartStorage, MAX_ITEM_QUANTITY};

/// One async mutex per cart owner, dropped once nobody holds or awaits it.
#[derive(Debug, Clone, Default)]
struct OwnerLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OwnerLocks {
    async fn lock(&self, owner: &CartOwner) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(owner.key()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// High-level cart operations.
///
/// Each write is load-modify-save against the storage, serialized per owner
/// within this process so concurrent requests from two tabs do not drop
/// each other's updates. Separate processes sharing one storage backend are
/// not coordinated.
#[derive(Debug, Clone)]
pub struct CartService<S: CartStorage> {
    storage: S,
    locks: OwnerLocks,
}

impl<S: CartStorage> CartService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            locks: OwnerLocks::default(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the owner's cart, empty if none was saved.
    pub async fn get(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        Ok(self.storage.load(owner).await?.unwrap_or_default())
    }

    /// Adds `quantity` units of an item.
    #[tracing::instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        mut item: CartItem,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        item.quantity = positive_quantity(quantity)?;
        let _guard = self.locks.lock(owner).await;
        let mut cart = self.get(owner).await?;
        cart.add(item);
        self.storage.save(owner, &cart).await?;
        Ok(cart)
    }

    /// Sets an item's quantity; zero removes the item.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_ITEM_QUANTITY)
            .ok_or(CartError::InvalidQuantity(quantity))?;
        let _guard = self.locks.lock(owner).await;
        let mut cart = self.get(owner).await?;
        if cart.set_quantity(product_id, quantity) {
            self.storage.save(owner, &cart).await?;
        }
        Ok(cart)
    }

    /// Removes a product from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<Cart, CartError> {
        let _guard = self.locks.lock(owner).await;
        let mut cart = self.get(owner).await?;
        if cart.remove(product_id) {
            self.storage.save(owner, &cart).await?;
        }
        Ok(cart)
    }

    /// Empties the cart.
    pub async fn clear(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        let _guard = self.locks.lock(owner).await;
        self.storage.delete(owner).await?;
        Ok(Cart::default())
    }

    /// Folds the guest cart into the user's cart and deletes the guest cart.
    ///
    /// Quantities of products present in both carts are added together;
    /// guest-only products are appended. An empty or missing guest cart
    /// leaves the user's cart untouched.
    #[tracing::instrument(skip(self))]
    pub async fn merge_carts(&self, guest_cart_id: &str, user_id: &str) -> Result<Cart, CartError> {
        let guest = CartOwner::parse("guest", guest_cart_id).ok_or(CartError::MissingOwner)?;
        let user = CartOwner::parse("user", user_id).ok_or(CartError::MissingOwner)?;

        // guest before user, the same order for every caller
        let _guest_guard = self.locks.lock(&guest).await;
        let _user_guard = self.locks.lock(&user).await;
        let mut user_cart = self.get(&user).await?;
        let Some(guest_cart) = self.storage.load(&guest).await? else {
            return Ok(user_cart);
        };

        if !guest_cart.is_empty() {
            let merged_items = guest_cart.items.len();
            user_cart.merge(guest_cart);
            self.storage.save(&user, &user_cart).await?;
            tracing::info!(merged_items, "guest cart merged");
        }
        self.storage.delete(&guest).await?;

        Ok(user_cart)
    }
}

fn positive_quantity(quantity: i64) -> Result<u32, CartError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| (1..=MAX_ITEM_QUANTITY).contains(q))
        .ok_or(CartError::InvalidQuantity(quantity))
}
