//! Cart storage trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Cart, CartError, CartOwner};

/// Persistence for carts, keyed by [`CartOwner::key`].
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Loads a cart. Returns None if the owner has never saved one.
    async fn load(&self, owner: &CartOwner) -> Result<Option<Cart>, CartError>;

    /// Replaces the owner's cart.
    async fn save(&self, owner: &CartOwner, cart: &Cart) -> Result<(), CartError>;

    /// Deletes the owner's cart. Deleting a missing cart is not an error.
    async fn delete(&self, owner: &CartOwner) -> Result<(), CartError>;
}

/// In-memory cart storage for tests and single-process development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStorage {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
}

impl InMemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored carts.
    pub async fn cart_count(&self) -> usize {
        self.carts.read().await.len()
    }
}

#[async_trait]
impl CartStorage for InMemoryCartStorage {
    async fn load(&self, owner: &CartOwner) -> Result<Option<Cart>, CartError> {
        Ok(self.carts.read().await.get(&owner.key()).cloned())
    }

    async fn save(&self, owner: &CartOwner, cart: &Cart) -> Result<(), CartError> {
        self.carts.write().await.insert(owner.key(), cart.clone());
        Ok(())
    }

    async fn delete(&self, owner: &CartOwner) -> Result<(), CartError> {
        self.carts.write().await.remove(&owner.key());
        Ok(())
    }
}
