//! PostgreSQL cart storage.

use async_trait::async_trait;
use domain::{Cart, CartError, CartOwner, CartStorage};
use sqlx::PgPool;
use sqlx::types::Json;

/// Stores each cart as one JSONB document keyed by owner.
#[derive(Clone)]
pub struct PostgresCartStorage {
    pool: PgPool,
}

impl PostgresCartStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_error(err: sqlx::Error) -> CartError {
    CartError::Storage(err.to_string())
}

#[async_trait]
impl CartStorage for PostgresCartStorage {
    async fn load(&self, owner: &CartOwner) -> Result<Option<Cart>, CartError> {
        let cart: Option<Json<Cart>> =
            sqlx::query_scalar("SELECT items FROM carts WHERE owner_key = $1")
                .bind(owner.key())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(cart.map(|Json(cart)| cart))
    }

    async fn save(&self, owner: &CartOwner, cart: &Cart) -> Result<(), CartError> {
        sqlx::query(
            r#"
            INSERT INTO carts (owner_key, items, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (owner_key)
            DO UPDATE SET items = EXCLUDED.items, updated_at = NOW()
            "#,
        )
        .bind(owner.key())
        .bind(Json(cart))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn delete(&self, owner: &CartOwner) -> Result<(), CartError> {
        sqlx::query("DELETE FROM carts WHERE owner_key = $1")
            .bind(owner.key())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(())
    }
}
